//! In-process device backend with scripted virtual devices.
//!
//! [`MemoryBackend`] is handed to the engine; the matching [`MemoryHandle`]
//! stays with the test or replay driver and changes device state. Every
//! change raises the wake signal of the device if it is acquired.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use parking_lot::Mutex;

use super::{
    AxisRange, CooperativeLevel, DeviceBackend, DeviceClass, DeviceId, DeviceInfo, DeviceObject,
    JoystickSample, KeyboardState, MouseState, WakeSignal,
};
use crate::identifier::Key;

/// Buttons on the default virtual mouse.
pub const DEFAULT_MOUSE_BUTTONS: usize = 5;

#[derive(Debug)]
struct Acquisition {
    level: CooperativeLevel,
    buffer_size: usize,
    wake: WakeSignal,
}

#[derive(Debug)]
struct VirtualDevice {
    info: DeviceInfo,
    objects: Vec<DeviceObject>,
    ranges: HashMap<u32, AxisRange>,
    keyboard: KeyboardState,
    mouse: MouseState,
    buffer: VecDeque<JoystickSample>,
    acquired: Option<Acquisition>,
    fail_acquire: bool,
    fail_sampling: bool,
}

impl VirtualDevice {
    fn new(id: DeviceId, class: DeviceClass, product_name: Option<String>) -> Self {
        Self {
            info: DeviceInfo {
                id,
                class,
                product_name,
            },
            objects: Vec::new(),
            ranges: HashMap::new(),
            keyboard: KeyboardState::new(),
            mouse: MouseState::default(),
            buffer: VecDeque::new(),
            acquired: None,
            fail_acquire: false,
            fail_sampling: false,
        }
    }

    #[inline]
    fn wake(&self) {
        if let Some(acquisition) = &self.acquired {
            acquisition.wake.raise();
        }
    }
}

#[derive(Debug, Default)]
struct Devices {
    list: Vec<VirtualDevice>,
}

impl Devices {
    fn get(&self, id: DeviceId) -> Option<&VirtualDevice> {
        self.list.iter().find(|device| device.info.id == id)
    }

    fn get_mut(&mut self, id: DeviceId) -> Option<&mut VirtualDevice> {
        self.list.iter_mut().find(|device| device.info.id == id)
    }

    fn add(&mut self, device: VirtualDevice) {
        match self.get_mut(device.info.id) {
            Some(existing) => *existing = device,
            None => self.list.push(device),
        }
    }

    fn sampled(&mut self, id: DeviceId) -> anyhow::Result<&mut VirtualDevice> {
        let device = self
            .get_mut(id)
            .ok_or_else(|| anyhow!("device {} is not attached", id))?;
        if device.acquired.is_none() {
            bail!("device {} is not acquired", id);
        }
        if device.fail_sampling {
            bail!("device {} lost", id);
        }
        Ok(device)
    }
}

/// Device backend over virtual devices.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    devices: Arc<Mutex<Devices>>,
}

impl MemoryBackend {
    /// A backend with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with the system keyboard and a five-button system mouse.
    pub fn with_system_devices() -> Self {
        let backend = Self::new();
        let handle = backend.handle();
        handle.add_keyboard();
        handle.add_mouse(DEFAULT_MOUSE_BUTTONS);
        backend
    }

    /// Handle for scripting the devices of this backend.
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            devices: Arc::clone(&self.devices),
        }
    }
}

impl DeviceBackend for MemoryBackend {
    fn devices(&mut self, class: DeviceClass) -> anyhow::Result<Vec<DeviceInfo>> {
        Ok(self
            .devices
            .lock()
            .list
            .iter()
            .filter(|device| device.info.class == class)
            .map(|device| device.info.clone())
            .collect())
    }

    fn acquire(
        &mut self,
        device: &DeviceInfo,
        level: CooperativeLevel,
        buffer_size: usize,
        wake: WakeSignal,
    ) -> anyhow::Result<()> {
        let mut devices = self.devices.lock();
        let virtual_device = devices
            .get_mut(device.id)
            .ok_or_else(|| anyhow!("device {} is not attached", device.id))?;
        if virtual_device.fail_acquire {
            bail!("device {} refused acquisition", device.id);
        }

        virtual_device.buffer.clear();
        virtual_device.acquired = Some(Acquisition {
            level,
            buffer_size: buffer_size.max(1),
            wake,
        });
        Ok(())
    }

    fn release(&mut self, device: DeviceId) {
        if let Some(virtual_device) = self.devices.lock().get_mut(device) {
            virtual_device.acquired = None;
            virtual_device.buffer.clear();
        }
    }

    fn keyboard_state(&mut self, device: DeviceId) -> anyhow::Result<KeyboardState> {
        Ok(self.devices.lock().sampled(device)?.keyboard)
    }

    fn mouse_state(&mut self, device: DeviceId) -> anyhow::Result<MouseState> {
        Ok(self.devices.lock().sampled(device)?.mouse.clone())
    }

    fn joystick_data(&mut self, device: DeviceId) -> anyhow::Result<Vec<JoystickSample>> {
        Ok(self.devices.lock().sampled(device)?.buffer.drain(..).collect())
    }

    fn objects(&mut self, device: DeviceId) -> anyhow::Result<Vec<DeviceObject>> {
        self.devices
            .lock()
            .get(device)
            .map(|d| d.objects.clone())
            .ok_or_else(|| anyhow!("device {} is not attached", device))
    }

    fn range(&mut self, device: DeviceId, offset: u32) -> Option<AxisRange> {
        self.devices
            .lock()
            .get(device)
            .and_then(|d| d.ranges.get(&offset).copied())
    }
}

/// Cloneable driver for a [`MemoryBackend`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    devices: Arc<Mutex<Devices>>,
}

impl MemoryHandle {
    pub fn add_keyboard(&self) {
        self.devices.lock().add(VirtualDevice::new(
            DeviceId::SYSTEM_KEYBOARD,
            DeviceClass::Keyboard,
            Some("Keyboard".to_string()),
        ));
    }

    pub fn add_mouse(&self, buttons: usize) {
        let mut device = VirtualDevice::new(
            DeviceId::SYSTEM_MOUSE,
            DeviceClass::Mouse,
            Some("Mouse".to_string()),
        );
        device.mouse = MouseState::from_buttons(std::iter::repeat_n(false, buttons));
        self.devices.lock().add(device);
    }

    /// Adds a joystick. Objects with a range in `ranges` report it through
    /// [`DeviceBackend::range`].
    pub fn add_joystick(
        &self,
        id: DeviceId,
        product_name: &str,
        objects: Vec<DeviceObject>,
        ranges: impl IntoIterator<Item = (u32, AxisRange)>,
    ) {
        let mut device = VirtualDevice::new(
            id,
            DeviceClass::Joystick,
            Some(product_name.to_string()),
        );
        device.objects = objects;
        device.ranges = ranges.into_iter().collect();
        self.devices.lock().add(device);
    }

    /// Detaches a device from the virtual system.
    pub fn remove_device(&self, id: DeviceId) -> bool {
        let mut devices = self.devices.lock();
        let before = devices.list.len();
        devices.list.retain(|device| device.info.id != id);
        devices.list.len() != before
    }

    /// Presses `keys` in addition to those already held.
    pub fn press_keys(&self, keys: &[Key]) {
        self.update_keyboard(|state| keys.iter().for_each(|&key| state.press(key)));
    }

    pub fn release_keys(&self, keys: &[Key]) {
        self.update_keyboard(|state| keys.iter().for_each(|&key| state.release(key)));
    }

    pub fn release_all_keys(&self) {
        self.update_keyboard(|state| *state = KeyboardState::new());
    }

    fn update_keyboard(&self, update: impl FnOnce(&mut KeyboardState)) {
        let mut devices = self.devices.lock();
        if let Some(device) = devices.get_mut(DeviceId::SYSTEM_KEYBOARD) {
            update(&mut device.keyboard);
            device.wake();
        }
    }

    /// Replaces the mouse button state.
    pub fn set_mouse_buttons(&self, buttons: &[bool]) {
        let mut devices = self.devices.lock();
        if let Some(device) = devices.get_mut(DeviceId::SYSTEM_MOUSE) {
            device.mouse = MouseState::from_buttons(buttons.iter().copied());
            device.wake();
        }
    }

    /// Sets one mouse button, growing the button set if needed.
    pub fn set_mouse_button(&self, index: u8, pressed: bool) {
        let mut devices = self.devices.lock();
        if let Some(device) = devices.get_mut(DeviceId::SYSTEM_MOUSE) {
            let index = index as usize;
            if device.mouse.buttons.len() <= index {
                device.mouse.buttons.resize(index + 1, false);
            }
            device.mouse.buttons[index] = pressed;
            device.wake();
        }
    }

    /// Buffers one joystick data item. Ignored while the device is not
    /// acquired; the oldest item is dropped when the buffer is full.
    pub fn push_joystick(&self, id: DeviceId, offset: u32, value: i32) {
        self.push_joystick_batch(id, &[JoystickSample::new(offset, value)]);
    }

    /// Buffers several items and raises the wake signal once.
    pub fn push_joystick_batch(&self, id: DeviceId, samples: &[JoystickSample]) {
        let mut devices = self.devices.lock();
        let Some(device) = devices.get_mut(id) else {
            return;
        };
        let Some(capacity) = device.acquired.as_ref().map(|a| a.buffer_size) else {
            return;
        };

        for &sample in samples {
            if device.buffer.len() == capacity {
                device.buffer.pop_front();
            }
            device.buffer.push_back(sample);
        }
        device.wake();
    }

    /// Makes the next acquisitions of `id` fail.
    pub fn fail_acquire(&self, id: DeviceId, fail: bool) {
        if let Some(device) = self.devices.lock().get_mut(id) {
            device.fail_acquire = fail;
        }
    }

    /// Makes state reads of `id` fail, as with a device that was unplugged.
    pub fn fail_sampling(&self, id: DeviceId, fail: bool) {
        if let Some(device) = self.devices.lock().get_mut(id) {
            device.fail_sampling = fail;
        }
    }

    /// Raises the wake signal of `id` without changing its state.
    pub fn wake(&self, id: DeviceId) {
        if let Some(device) = self.devices.lock().get(id) {
            device.wake();
        }
    }

    pub fn is_acquired(&self, id: DeviceId) -> bool {
        self.devices
            .lock()
            .get(id)
            .is_some_and(|device| device.acquired.is_some())
    }

    pub fn cooperative_level(&self, id: DeviceId) -> Option<CooperativeLevel> {
        self.devices
            .lock()
            .get(id)
            .and_then(|device| device.acquired.as_ref().map(|a| a.level))
    }

    pub fn acquired_count(&self) -> usize {
        self.devices
            .lock()
            .list
            .iter()
            .filter(|device| device.acquired.is_some())
            .count()
    }

    /// Items currently buffered for `id`.
    pub fn buffered(&self, id: DeviceId) -> usize {
        self.devices
            .lock()
            .get(id)
            .map_or(0, |device| device.buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ObjectKind;

    const PAD: DeviceId = DeviceId::from_u128(0x5a5a5a5a_0000_11ef_8000_444553540000);

    fn acquire(backend: &mut MemoryBackend, id: DeviceId) -> crossbeam_channel::Receiver<()> {
        let info = backend
            .devices(id.class())
            .unwrap()
            .into_iter()
            .find(|d| d.id == id)
            .unwrap();
        let (wake, rx) = WakeSignal::pair();
        backend
            .acquire(&info, CooperativeLevel::BackgroundShared, 2, wake)
            .unwrap();
        rx
    }

    #[test]
    fn test_enumerate_by_class() {
        let mut backend = MemoryBackend::with_system_devices();
        backend.handle().add_joystick(PAD, "Pad", Vec::new(), []);

        let keyboards = backend.devices(DeviceClass::Keyboard).unwrap();
        assert_eq!(keyboards.len(), 1);
        assert_eq!(keyboards[0].id, DeviceId::SYSTEM_KEYBOARD);
        assert_eq!(backend.devices(DeviceClass::Joystick).unwrap()[0].id, PAD);
    }

    #[test]
    fn test_keyboard_changes_raise_wake() {
        let mut backend = MemoryBackend::with_system_devices();
        let handle = backend.handle();
        let rx = acquire(&mut backend, DeviceId::SYSTEM_KEYBOARD);

        handle.press_keys(&[Key::A]);
        assert!(rx.try_recv().is_ok());
        let state = backend.keyboard_state(DeviceId::SYSTEM_KEYBOARD).unwrap();
        assert!(state.is_pressed(Key::A));

        handle.release_all_keys();
        assert!(rx.try_recv().is_ok());
        assert!(
            backend
                .keyboard_state(DeviceId::SYSTEM_KEYBOARD)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_unacquired_device_is_silent_and_unreadable() {
        let mut backend = MemoryBackend::with_system_devices();
        backend.handle().press_keys(&[Key::B]);
        assert!(backend.keyboard_state(DeviceId::SYSTEM_KEYBOARD).is_err());
    }

    #[test]
    fn test_joystick_buffer_drains_and_overflows() {
        let mut backend = MemoryBackend::new();
        let handle = backend.handle();
        handle.add_joystick(
            PAD,
            "Pad",
            vec![DeviceObject {
                offset: 48,
                kind: ObjectKind::Button,
                name: None,
            }],
            [(0, AxisRange::new(0.0, 100.0))],
        );
        let _rx = acquire(&mut backend, PAD);

        handle.push_joystick_batch(
            PAD,
            &[
                JoystickSample::new(0, 1),
                JoystickSample::new(0, 2),
                JoystickSample::new(0, 3),
            ],
        );
        assert_eq!(handle.buffered(PAD), 2);
        assert_eq!(
            backend.joystick_data(PAD).unwrap(),
            vec![JoystickSample::new(0, 2), JoystickSample::new(0, 3)]
        );
        assert!(backend.joystick_data(PAD).unwrap().is_empty());
        assert_eq!(backend.range(PAD, 0), Some(AxisRange::new(0.0, 100.0)));
        assert_eq!(backend.range(PAD, 48), None);
    }

    #[test]
    fn test_failures() {
        let mut backend = MemoryBackend::with_system_devices();
        let handle = backend.handle();
        handle.fail_acquire(DeviceId::SYSTEM_MOUSE, true);

        let mouse = backend.devices(DeviceClass::Mouse).unwrap().remove(0);
        let (wake, _rx) = WakeSignal::pair();
        assert!(
            backend
                .acquire(&mouse, CooperativeLevel::BackgroundShared, 10, wake)
                .is_err()
        );

        let _rx = acquire(&mut backend, DeviceId::SYSTEM_KEYBOARD);
        handle.fail_sampling(DeviceId::SYSTEM_KEYBOARD, true);
        assert!(backend.keyboard_state(DeviceId::SYSTEM_KEYBOARD).is_err());
        assert_eq!(handle.acquired_count(), 1);

        backend.release(DeviceId::SYSTEM_KEYBOARD);
        assert_eq!(handle.acquired_count(), 0);
    }
}
