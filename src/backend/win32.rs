//! Windows device backend over `GetAsyncKeyState` and XInput.
//!
//! A sampler thread polls every acquired device at 1 ms, keeps the latest
//! keyboard and mouse snapshots, turns XInput gamepad changes into buffered
//! joystick data and raises a device's wake signal whenever its state
//! changed.
//!
//! Pads are exposed as joysticks with button offsets 0-15 (the bit index in
//! `wButtons`) and axis offsets 16-21 (left stick X/Y, right stick X/Y, left
//! and right trigger).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail};
use log::{debug, warn};
use parking_lot::Mutex;
use strum::IntoEnumIterator;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, MAPVK_VSC_TO_VK_EX, MapVirtualKeyW,
};
use windows::Win32::UI::Input::XboxController::*;
use windows::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

use super::{
    AxisRange, CooperativeLevel, DeviceBackend, DeviceClass, DeviceId, DeviceInfo, DeviceObject,
    JOYSTICK_PRESSED, JoystickSample, KeyboardState, MouseState, ObjectKind, WakeSignal,
};
use crate::identifier::Key;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Base of the synthesized ids of XInput pads; the user index goes in the
/// low byte.
const XINPUT_ID_BASE: u128 = 0x9e4b7a00_2c1d_11ef_9a3e_584e50554400;

/// Mouse buttons in index order: left, right, middle, X1, X2.
const MOUSE_BUTTON_VKS: [i32; 5] = [0x01, 0x02, 0x04, 0x05, 0x06];

const BUTTON_OBJECTS: [(u32, &str); 14] = [
    (0, "D-Pad Up"),
    (1, "D-Pad Down"),
    (2, "D-Pad Left"),
    (3, "D-Pad Right"),
    (4, "Start"),
    (5, "Back"),
    (6, "Left Thumb"),
    (7, "Right Thumb"),
    (8, "Left Shoulder"),
    (9, "Right Shoulder"),
    (12, "A"),
    (13, "B"),
    (14, "X"),
    (15, "Y"),
];

const AXIS_OBJECTS: [(u32, &str); 6] = [
    (16, "Left Stick X"),
    (17, "Left Stick Y"),
    (18, "Right Stick X"),
    (19, "Right Stick Y"),
    (20, "Left Trigger"),
    (21, "Right Trigger"),
];

const PAD_VALUES: usize = 22;

const STICK_RANGE: AxisRange = AxisRange {
    min: i16::MIN as f64,
    max: i16::MAX as f64,
};
const TRIGGER_RANGE: AxisRange = AxisRange {
    min: 0.0,
    max: u8::MAX as f64,
};

/// Virtual key of every key that has one, resolved once from scan codes.
static KEY_VKS: LazyLock<Vec<(Key, i32)>> = LazyLock::new(|| {
    Key::iter()
        .filter_map(|key| {
            let code = key.code() as u32;
            let scan = if code & 0x80 != 0 {
                0xE000 | (code & 0x7F)
            } else {
                code
            };
            let vk = unsafe { MapVirtualKeyW(scan, MAPVK_VSC_TO_VK_EX) };
            (vk != 0).then_some((key, vk as i32))
        })
        .collect()
});

#[inline(always)]
fn xinput_id(user_index: u32) -> DeviceId {
    DeviceId::from_u128(XINPUT_ID_BASE | user_index as u128)
}

#[inline(always)]
fn user_index(id: DeviceId) -> Option<u32> {
    let raw = id.as_uuid().as_u128();
    let index = (raw & 0xFF) as u32;
    (raw & !0xFF == XINPUT_ID_BASE && index < XUSER_MAX_COUNT).then_some(index)
}

#[inline(always)]
fn is_down(vk: i32) -> bool {
    unsafe { GetAsyncKeyState(vk) < 0 }
}

fn pad_state(user_index: u32) -> Option<XINPUT_STATE> {
    let mut state = XINPUT_STATE::default();
    (unsafe { XInputGetState(user_index, &mut state) } == 0).then_some(state)
}

fn pad_values(gamepad: &XINPUT_GAMEPAD) -> [i32; PAD_VALUES] {
    let mut values = [0; PAD_VALUES];
    let buttons = gamepad.wButtons.0;
    for (offset, _) in BUTTON_OBJECTS {
        if buttons & (1 << offset) != 0 {
            values[offset as usize] = JOYSTICK_PRESSED;
        }
    }
    values[16] = gamepad.sThumbLX as i32;
    values[17] = gamepad.sThumbLY as i32;
    values[18] = gamepad.sThumbRX as i32;
    values[19] = gamepad.sThumbRY as i32;
    values[20] = gamepad.bLeftTrigger as i32;
    values[21] = gamepad.bRightTrigger as i32;
    values
}

enum Source {
    Keyboard(KeyboardState),
    Mouse(MouseState),
    Pad {
        user_index: u32,
        packet: u32,
        values: [i32; PAD_VALUES],
        buffer: VecDeque<JoystickSample>,
    },
}

struct Acquired {
    level: CooperativeLevel,
    buffer_size: usize,
    wake: WakeSignal,
    source: Source,
}

impl Acquired {
    #[inline]
    fn has_focus(&self) -> bool {
        match self.level {
            CooperativeLevel::BackgroundShared => true,
            CooperativeLevel::ForegroundExclusive(window) => {
                unsafe { GetForegroundWindow() }.0 as isize == window.0
            }
        }
    }

    /// Refreshes the snapshot, returning whether anything changed.
    fn poll(&mut self) -> bool {
        let focused = self.has_focus();

        match &mut self.source {
            Source::Keyboard(last) => {
                let mut state = KeyboardState::new();
                if focused {
                    for &(key, vk) in KEY_VKS.iter() {
                        if is_down(vk) {
                            state.press(key);
                        }
                    }
                }
                if state == *last {
                    return false;
                }
                *last = state;
                true
            }
            Source::Mouse(last) => {
                let state = MouseState::from_buttons(
                    MOUSE_BUTTON_VKS.iter().map(|&vk| focused && is_down(vk)),
                );
                if state == *last {
                    return false;
                }
                *last = state;
                true
            }
            Source::Pad {
                user_index,
                packet,
                values,
                buffer,
            } => {
                let Some(state) = pad_state(*user_index) else {
                    return false;
                };
                if state.dwPacketNumber == *packet {
                    return false;
                }
                *packet = state.dwPacketNumber;

                let current = if focused {
                    pad_values(&state.Gamepad)
                } else {
                    [0; PAD_VALUES]
                };
                let mut changed = false;
                for (offset, (&new, old)) in current.iter().zip(values.iter_mut()).enumerate() {
                    if new != *old {
                        *old = new;
                        if buffer.len() == self.buffer_size {
                            buffer.pop_front();
                        }
                        buffer.push_back(JoystickSample::new(offset as u32, new));
                        changed = true;
                    }
                }
                changed
            }
        }
    }
}

type Devices = Arc<Mutex<HashMap<DeviceId, Acquired>>>;

/// Device backend for the system keyboard, mouse and XInput pads.
pub struct Win32Backend {
    devices: Devices,
    stop: Arc<AtomicBool>,
    sampler: Option<thread::JoinHandle<()>>,
}

impl Win32Backend {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(Mutex::new(HashMap::new())),
            stop: Arc::new(AtomicBool::new(false)),
            sampler: None,
        }
    }

    fn ensure_sampler(&mut self) -> anyhow::Result<()> {
        if self.sampler.is_some() {
            return Ok(());
        }

        let devices = Arc::clone(&self.devices);
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name("inputbind_win32_sampler".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    {
                        let mut devices = devices.lock();
                        for acquired in devices.values_mut() {
                            if acquired.poll() {
                                acquired.wake.raise();
                            }
                        }
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
            .map_err(|e| anyhow!("Failed to start sampler thread: {}", e))?;

        self.sampler = Some(handle);
        Ok(())
    }
}

impl Default for Win32Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Win32Backend {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.sampler.take()
            && handle.join().is_err()
        {
            warn!("Sampler thread panicked");
        }
    }
}

impl DeviceBackend for Win32Backend {
    fn devices(&mut self, class: DeviceClass) -> anyhow::Result<Vec<DeviceInfo>> {
        let devices = match class {
            DeviceClass::Keyboard => vec![DeviceInfo {
                id: DeviceId::SYSTEM_KEYBOARD,
                class,
                product_name: Some("Keyboard".to_string()),
            }],
            DeviceClass::Mouse => vec![DeviceInfo {
                id: DeviceId::SYSTEM_MOUSE,
                class,
                product_name: Some("Mouse".to_string()),
            }],
            DeviceClass::Joystick => (0..XUSER_MAX_COUNT)
                .filter(|&index| pad_state(index).is_some())
                .map(|index| DeviceInfo {
                    id: xinput_id(index),
                    class,
                    product_name: Some(format!("XInput Controller {}", index + 1)),
                })
                .collect(),
        };
        debug!("Found {} {:?} devices", devices.len(), class);
        Ok(devices)
    }

    fn acquire(
        &mut self,
        device: &DeviceInfo,
        level: CooperativeLevel,
        buffer_size: usize,
        wake: WakeSignal,
    ) -> anyhow::Result<()> {
        let source = match device.class {
            DeviceClass::Keyboard => Source::Keyboard(KeyboardState::new()),
            DeviceClass::Mouse => Source::Mouse(MouseState::default()),
            DeviceClass::Joystick => {
                let index = user_index(device.id)
                    .ok_or_else(|| anyhow!("{} is not an XInput pad", device.id))?;
                let Some(state) = pad_state(index) else {
                    bail!("XInput pad {} is not connected", index);
                };
                Source::Pad {
                    user_index: index,
                    packet: state.dwPacketNumber,
                    values: pad_values(&state.Gamepad),
                    buffer: VecDeque::new(),
                }
            }
        };

        self.ensure_sampler()?;
        self.devices.lock().insert(
            device.id,
            Acquired {
                level,
                buffer_size: buffer_size.max(1),
                wake,
                source,
            },
        );
        Ok(())
    }

    fn release(&mut self, device: DeviceId) {
        self.devices.lock().remove(&device);
    }

    fn keyboard_state(&mut self, device: DeviceId) -> anyhow::Result<KeyboardState> {
        match self.devices.lock().get(&device).map(|a| &a.source) {
            Some(Source::Keyboard(state)) => Ok(*state),
            _ => bail!("{} is not an acquired keyboard", device),
        }
    }

    fn mouse_state(&mut self, device: DeviceId) -> anyhow::Result<MouseState> {
        match self.devices.lock().get(&device).map(|a| &a.source) {
            Some(Source::Mouse(state)) => Ok(state.clone()),
            _ => bail!("{} is not an acquired mouse", device),
        }
    }

    fn joystick_data(&mut self, device: DeviceId) -> anyhow::Result<Vec<JoystickSample>> {
        match self.devices.lock().get_mut(&device).map(|a| &mut a.source) {
            Some(Source::Pad { buffer, .. }) => Ok(buffer.drain(..).collect()),
            _ => bail!("{} is not an acquired joystick", device),
        }
    }

    fn objects(&mut self, device: DeviceId) -> anyhow::Result<Vec<DeviceObject>> {
        if user_index(device).is_none() {
            bail!("{} is not an XInput pad", device);
        }

        let buttons = BUTTON_OBJECTS.iter().map(|&(offset, name)| DeviceObject {
            offset,
            kind: ObjectKind::Button,
            name: Some(name.to_string()),
        });
        let axes = AXIS_OBJECTS.iter().map(|&(offset, name)| DeviceObject {
            offset,
            kind: ObjectKind::Axis,
            name: Some(name.to_string()),
        });
        Ok(buttons.chain(axes).collect())
    }

    fn range(&mut self, device: DeviceId, offset: u32) -> Option<AxisRange> {
        user_index(device)?;
        match offset {
            16..=19 => Some(STICK_RANGE),
            20 | 21 => Some(TRIGGER_RANGE),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xinput_ids_round_trip() {
        for index in 0..XUSER_MAX_COUNT {
            let id = xinput_id(index);
            assert_eq!(id.class(), DeviceClass::Joystick);
            assert_eq!(user_index(id), Some(index));
        }
        assert_eq!(user_index(DeviceId::SYSTEM_KEYBOARD), None);
        assert_eq!(user_index(xinput_id(9)), None);
    }

    #[test]
    fn test_pad_values() {
        let gamepad = XINPUT_GAMEPAD {
            wButtons: XINPUT_GAMEPAD_BUTTON_FLAGS(0x1001),
            bLeftTrigger: 200,
            sThumbLX: -300,
            ..Default::default()
        };
        let values = pad_values(&gamepad);
        assert_eq!(values[0], JOYSTICK_PRESSED);
        assert_eq!(values[12], JOYSTICK_PRESSED);
        assert_eq!(values[1], 0);
        assert_eq!(values[16], -300);
        assert_eq!(values[20], 200);
    }

    #[test]
    fn test_key_table_covers_letters() {
        assert!(KEY_VKS.iter().any(|&(key, vk)| key == Key::A && vk == 0x41));
    }
}
