//! Device arena, wait loop and per-device dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Select};
use log::{debug, info, trace, warn};
use smallvec::SmallVec;

use super::{CommandStateChanged, Shared};
use crate::backend::{
    AxisRange, CooperativeLevel, DeviceBackend, DeviceClass, DeviceId, DeviceInfo, JOYSTICK_PRESSED,
    KeyboardState, MouseState, ObjectKind, POV_CENTERED, WakeSignal,
};
use crate::bindings::BindingTable;
use crate::catalog::{DeviceCatalog, DeviceEntry};
use crate::edge::EdgeDetector;
use crate::error::{Error, Result};
use crate::handoff::HandoffQueue;
use crate::identifier::{AxisDirection, Chord, InputIdentifier, Key, MODIFIER_KEYS};

/// Edge state of every bound control, per device class.
#[derive(Debug, Default)]
pub(super) struct EdgeStates {
    keyboard: EdgeDetector<Chord>,
    mouse: EdgeDetector<u8>,
    joystick: EdgeDetector<(DeviceId, u32)>,
}

impl EdgeStates {
    pub(super) fn reset(&mut self) {
        self.keyboard.reset();
        self.mouse.reset();
        self.joystick.reset();
    }
}

/// One acquired device. Its index in the arena matches the index of its
/// wake signal in the polling thread's select set.
#[derive(Debug)]
struct AttachedDevice {
    info: DeviceInfo,
    buttons: HashSet<u32>,
    hats: HashSet<u32>,
    ranges: HashMap<u32, Option<AxisRange>>,
    /// First value seen per axis while recording.
    initial: HashMap<u32, f64>,
}

impl AttachedDevice {
    fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            buttons: HashSet::new(),
            hats: HashSet::new(),
            ranges: HashMap::new(),
            initial: HashMap::new(),
        }
    }
}

/// Everything guarded by the engine lock.
pub(super) struct Core<B, C> {
    backend: B,
    pub(super) bindings: BindingTable<C>,
    pub(super) edges: EdgeStates,
    pub(super) recorder: Option<Arc<HandoffQueue<InputIdentifier>>>,
    devices: Vec<AttachedDevice>,
}

impl<B: DeviceBackend, C: Clone> Core<B, C> {
    pub(super) fn new(backend: B) -> Self {
        Self {
            backend,
            bindings: BindingTable::new(),
            edges: EdgeStates::default(),
            recorder: None,
            devices: Vec::new(),
        }
    }

    /// Enumerates and acquires the system keyboard, the system mouse and
    /// every joystick. On failure everything acquired so far is released.
    pub(super) fn acquire_all(
        &mut self,
        level: CooperativeLevel,
        buffer_size: usize,
        catalog: &DeviceCatalog,
    ) -> Result<Vec<Receiver<()>>> {
        let found = self.enumerate()?;
        let mut wakes = Vec::with_capacity(found.len());

        for info in found {
            let (wake, rx) = WakeSignal::pair();
            if let Err(source) = self.backend.acquire(&info, level, buffer_size, wake) {
                warn!("Failed to acquire {}: {}", info.id, source);
                self.release_all();
                catalog.clear();
                return Err(Error::Device {
                    device: info.id,
                    source,
                });
            }

            let mut device = AttachedDevice::new(info);
            let objects = if device.info.class == DeviceClass::Joystick {
                match self.backend.objects(device.info.id) {
                    Ok(objects) => objects,
                    Err(e) => {
                        warn!("Failed to read objects of {}: {}", device.info.id, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            for object in &objects {
                match object.kind {
                    ObjectKind::Button => {
                        device.buttons.insert(object.offset);
                    }
                    ObjectKind::PointOfView => {
                        device.hats.insert(object.offset);
                    }
                    ObjectKind::Axis => {}
                }
            }

            catalog.insert(
                device.info.id,
                DeviceEntry {
                    class: device.info.class,
                    product_name: device.info.product_name.clone(),
                    objects,
                },
            );
            debug!(
                "Acquired {:?} {} ({})",
                device.info.class,
                device.info.id,
                device.info.product_name.as_deref().unwrap_or("unnamed")
            );

            self.devices.push(device);
            wakes.push(rx);
        }

        Ok(wakes)
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>> {
        let mut found = Vec::new();

        for (class, system_id) in [
            (DeviceClass::Keyboard, DeviceId::SYSTEM_KEYBOARD),
            (DeviceClass::Mouse, DeviceId::SYSTEM_MOUSE),
        ] {
            let devices = self
                .backend
                .devices(class)
                .map_err(|source| Error::Device {
                    device: system_id,
                    source,
                })?;
            match devices.into_iter().find(|info| info.id == system_id) {
                Some(info) => found.push(info),
                None => warn!("No system {:?} attached", class),
            }
        }

        match self.backend.devices(DeviceClass::Joystick) {
            Ok(joysticks) => {
                for info in joysticks {
                    if info.id.class() != DeviceClass::Joystick {
                        warn!("Skipping joystick with reserved id {}", info.id);
                        continue;
                    }
                    found.push(info);
                }
            }
            Err(e) => warn!("Failed to enumerate joysticks: {}", e),
        }

        debug!("Enumerated {} devices", found.len());
        Ok(found)
    }

    pub(super) fn release_all(&mut self) {
        for device in self.devices.drain(..) {
            self.backend.release(device.info.id);
        }
    }

    /// Samples the device in `slot` and collects the resulting events.
    fn dispatch(
        &mut self,
        slot: usize,
        threshold: f64,
        events: &mut Vec<CommandStateChanged<C>>,
    ) {
        let Some(device) = self.devices.get(slot) else {
            return;
        };
        let (id, class) = (device.info.id, device.info.class);
        trace!("Wake from {:?} {}", class, id);

        match class {
            DeviceClass::Keyboard => match self.backend.keyboard_state(id) {
                Ok(state) => self.on_keyboard(&state, events),
                Err(e) => warn!("Failed to read keyboard {}: {}", id, e),
            },
            DeviceClass::Mouse => {
                if self.recorder.is_none() && !self.bindings.has_mouse_bindings() {
                    return;
                }
                match self.backend.mouse_state(id) {
                    Ok(state) => self.on_mouse(&state, events),
                    Err(e) => warn!("Failed to read mouse {}: {}", id, e),
                }
            }
            DeviceClass::Joystick => match self.backend.joystick_data(id) {
                Ok(samples) => {
                    for sample in samples {
                        self.on_joystick(slot, sample.offset, sample.value, threshold, events);
                    }
                }
                Err(e) => warn!("Failed to read joystick {}: {}", id, e),
            },
        }
    }

    fn on_keyboard(&mut self, state: &KeyboardState, events: &mut Vec<CommandStateChanged<C>>) {
        if let Some(queue) = &self.recorder {
            if let Some(chord) = recorded_chord(state) {
                queue.enqueue(InputIdentifier::keys(chord));
            }
            return;
        }

        for (chord, command) in self.bindings.chords() {
            if let Some(edge) = self
                .edges
                .keyboard
                .update_button(chord.clone(), chord.is_held(state))
            {
                events.push(CommandStateChanged::new(command.clone(), edge));
            }
        }
    }

    fn on_mouse(&mut self, state: &MouseState, events: &mut Vec<CommandStateChanged<C>>) {
        if let Some(queue) = &self.recorder {
            if let Some(button) = state.first_pressed() {
                queue.enqueue(InputIdentifier::mouse_button(button));
            }
            return;
        }

        for (index, &pressed) in state.buttons.iter().enumerate() {
            let button = index as u8;
            if let Some(command) = self.bindings.resolve_mouse(button)
                && let Some(edge) = self.edges.mouse.update_button(button, pressed)
            {
                events.push(CommandStateChanged::new(command.clone(), edge));
            }
        }
    }

    fn on_joystick(
        &mut self,
        slot: usize,
        offset: u32,
        value: i32,
        threshold: f64,
        events: &mut Vec<CommandStateChanged<C>>,
    ) {
        let device = &mut self.devices[slot];
        let id = device.info.id;
        let is_button = device.buttons.contains(&offset);

        if let Some(queue) = &self.recorder {
            if is_button {
                if value == JOYSTICK_PRESSED {
                    queue.enqueue(InputIdentifier::joystick(id, offset, None));
                }
                return;
            }

            let Some(range) = object_range(&mut self.backend, device, offset) else {
                return;
            };
            let value = axis_value(device, offset, value, range);
            let initial = *device.initial.entry(offset).or_insert(value);
            if let Some(direction) = recorded_direction(initial, value, range, threshold) {
                queue.enqueue(InputIdentifier::joystick(id, offset, Some(direction)));
            }
            return;
        }

        let Some(command) = self.bindings.resolve_joystick(id, offset) else {
            return;
        };

        let edge = if is_button {
            self.edges
                .joystick
                .update_button((id, offset), value == JOYSTICK_PRESSED)
        } else {
            let Some(range) = object_range(&mut self.backend, device, offset) else {
                debug!("No range for object {} of {}, sample skipped", offset, id);
                return;
            };
            let percent = range.percent(axis_value(device, offset, value, range));
            self.edges.joystick.update_axis((id, offset), percent)
        };

        if let Some(edge) = edge {
            events.push(CommandStateChanged::new(command.clone(), edge));
        }
    }
}

/// Range of an object, read from the backend on first use.
fn object_range<B: DeviceBackend>(
    backend: &mut B,
    device: &mut AttachedDevice,
    offset: u32,
) -> Option<AxisRange> {
    let id = device.info.id;
    *device
        .ranges
        .entry(offset)
        .or_insert_with(|| backend.range(id, offset))
}

/// Raw value as a position in the object's range. A centered hat reports
/// the range maximum.
#[inline]
fn axis_value(device: &AttachedDevice, offset: u32, value: i32, range: AxisRange) -> f64 {
    if value == POV_CENTERED && device.hats.contains(&offset) {
        range.max
    } else {
        value as f64
    }
}

/// Held modifiers in fixed order followed by the first held non-modifier.
/// `None` while only modifiers are held.
fn recorded_chord(state: &KeyboardState) -> Option<Chord> {
    let key = state.pressed().find(|key| !key.is_modifier())?;
    let mut keys: SmallVec<[Key; 4]> = MODIFIER_KEYS
        .iter()
        .copied()
        .filter(|&modifier| state.is_pressed(modifier))
        .collect();
    keys.push(key);
    Chord::new(keys)
}

/// Direction of a recorded axis movement once it exceeds `threshold` of
/// the range.
fn recorded_direction(
    initial: f64,
    value: f64,
    range: AxisRange,
    threshold: f64,
) -> Option<AxisDirection> {
    let span = range.span();
    if span <= 0.0 {
        return None;
    }
    let delta = (value - initial) / span;
    if delta.abs() <= threshold {
        None
    } else if delta > 0.0 {
        Some(AxisDirection::Increasing)
    } else {
        Some(AxisDirection::Decreasing)
    }
}

/// Body of the polling thread.
pub(super) fn run<B, C>(
    shared: Arc<Shared<B, C>>,
    running: Arc<AtomicBool>,
    stop: Receiver<()>,
    wakes: Vec<Receiver<()>>,
) where
    B: DeviceBackend,
    C: Clone + Send + 'static,
{
    // Wake signals follow the stop signal: slot `n` is select index `n + 1`.
    let mut select = Select::new();
    let stop_index = select.recv(&stop);
    for rx in &wakes {
        select.recv(rx);
    }
    let threshold = shared.config.record_axis_threshold;
    let mut events = Vec::new();

    info!("Polling {} devices", wakes.len());

    while running.load(Ordering::Acquire) {
        let operation = select.select();
        let index = operation.index();

        if index == stop_index {
            let _ = operation.recv(&stop);
            break;
        }

        let slot = index - stop_index - 1;
        if operation.recv(&wakes[slot]).is_err() {
            debug!("Wake signal of slot {} closed", slot);
            select.remove(index);
            continue;
        }
        if !running.load(Ordering::Acquire) {
            break;
        }

        shared.core.lock().dispatch(slot, threshold, &mut events);
        shared.observers.emit(std::mem::take(&mut events));
    }

    debug!("Polling thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_chord_orders_modifiers() {
        let state = KeyboardState::from_keys([Key::A, Key::LeftShift, Key::RightControl]);
        let chord = recorded_chord(&state).unwrap();
        assert_eq!(chord.keys(), &[Key::RightControl, Key::LeftShift, Key::A]);
    }

    #[test]
    fn test_recorded_chord_needs_non_modifier() {
        let state = KeyboardState::from_keys([Key::LeftAlt, Key::LeftShift]);
        assert_eq!(recorded_chord(&state), None);
        assert_eq!(recorded_chord(&KeyboardState::new()), None);
    }

    #[test]
    fn test_recorded_direction_threshold() {
        let range = AxisRange::new(0.0, 1000.0);
        assert_eq!(recorded_direction(500.0, 700.0, range, 0.25), None);
        assert_eq!(recorded_direction(500.0, 750.0, range, 0.25), None);
        assert_eq!(
            recorded_direction(500.0, 800.0, range, 0.25),
            Some(AxisDirection::Increasing)
        );
        assert_eq!(
            recorded_direction(500.0, 100.0, range, 0.25),
            Some(AxisDirection::Decreasing)
        );
        assert_eq!(
            recorded_direction(0.0, 5.0, AxisRange::new(3.0, 3.0), 0.25),
            None
        );
    }

    #[test]
    fn test_centered_hat_reads_as_max() {
        let mut device = AttachedDevice::new(DeviceInfo {
            id: DeviceId::from_u128(1),
            class: DeviceClass::Joystick,
            product_name: None,
        });
        device.hats.insert(32);
        let range = AxisRange::new(0.0, 36000.0);

        assert_eq!(axis_value(&device, 32, POV_CENTERED, range), 36000.0);
        assert_eq!(axis_value(&device, 32, 9000, range), 9000.0);
        assert_eq!(axis_value(&device, 0, POV_CENTERED, range), -1.0);
    }
}
