//! Device backend abstraction.
//!
//! The engine never talks to an OS input API directly. A [`DeviceBackend`]
//! enumerates devices, acquires them with a cooperative level, raises the
//! device's [`WakeSignal`] whenever new data is available, and hands out
//! current or buffered state on request.

pub mod memory;
#[cfg(windows)]
pub mod win32;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use smallvec::SmallVec;

pub use crate::identifier::{DeviceClass, DeviceId, KeyboardState};

/// Raw value reported by a joystick button that is fully pressed.
pub const JOYSTICK_PRESSED: i32 = 128;

/// Raw value a point-of-view hat reports while centered.
pub const POV_CENTERED: i32 = -1;

/// Native window handle used for foreground acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Exclusivity policy used when acquiring a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooperativeLevel {
    /// Receive input while in the background, shared with other apps.
    BackgroundShared,
    /// Receive input only while `window` has focus, exclusively.
    ForegroundExclusive(WindowHandle),
}

/// An attached device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub class: DeviceClass,
    pub product_name: Option<String>,
}

/// Kind of a device object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Button,
    Axis,
    PointOfView,
}

/// One object (button, axis, hat) exposed by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceObject {
    pub offset: u32,
    pub kind: ObjectKind,
    pub name: Option<String>,
}

/// Declared value range of an analog object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline(always)]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `value` as a percentage of the range.
    pub fn percent(&self, value: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span) * 100.0
    }
}

/// Current mouse button state, indexed by button number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MouseState {
    pub buttons: SmallVec<[bool; 8]>,
}

impl MouseState {
    pub fn from_buttons<I: IntoIterator<Item = bool>>(buttons: I) -> Self {
        Self {
            buttons: buttons.into_iter().collect(),
        }
    }

    #[inline]
    pub fn first_pressed(&self) -> Option<u8> {
        self.buttons
            .iter()
            .position(|&pressed| pressed)
            .map(|index| index as u8)
    }
}

/// One buffered joystick data item: object offset and raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickSample {
    pub offset: u32,
    pub value: i32,
}

impl JoystickSample {
    pub fn new(offset: u32, value: i32) -> Self {
        Self { offset, value }
    }
}

/// Auto-reset notification a backend raises when a device has new data.
///
/// Raising an already raised signal is a no-op: wake-ups coalesce until the
/// engine consumes them.
#[derive(Debug, Clone)]
pub struct WakeSignal {
    tx: Sender<()>,
}

impl WakeSignal {
    /// Creates a signal and the receiver the engine waits on.
    pub fn pair() -> (Self, Receiver<()>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (Self { tx }, rx)
    }

    /// Raises the signal. Returns `false` once nobody is waiting on it anymore.
    #[inline]
    pub fn raise(&self) -> bool {
        !matches!(self.tx.try_send(()), Err(TrySendError::Disconnected(_)))
    }
}

/// Access to physical input devices.
///
/// Device handles are kept by the backend and addressed by [`DeviceId`].
/// All calls happen with the engine's lock held, from either the caller's
/// thread (attach/detach) or the polling thread (sampling).
pub trait DeviceBackend: Send + 'static {
    /// Attached devices of `class`.
    fn devices(&mut self, class: DeviceClass) -> anyhow::Result<Vec<DeviceInfo>>;

    /// Acquires a device. `buffer_size` is the number of buffered data
    /// items to keep; `wake` must be raised whenever new data is available.
    fn acquire(
        &mut self,
        device: &DeviceInfo,
        level: CooperativeLevel,
        buffer_size: usize,
        wake: WakeSignal,
    ) -> anyhow::Result<()>;

    /// Releases a device acquired earlier. Unknown ids are ignored.
    fn release(&mut self, device: DeviceId);

    fn keyboard_state(&mut self, device: DeviceId) -> anyhow::Result<KeyboardState>;

    fn mouse_state(&mut self, device: DeviceId) -> anyhow::Result<MouseState>;

    /// Drains buffered joystick data in arrival order.
    fn joystick_data(&mut self, device: DeviceId) -> anyhow::Result<Vec<JoystickSample>>;

    /// Objects exposed by the device.
    fn objects(&mut self, device: DeviceId) -> anyhow::Result<Vec<DeviceObject>>;

    /// Declared range of the object at `offset`, or `None` when the object
    /// has no range (buttons, unsupported objects).
    fn range(&mut self, device: DeviceId, offset: u32) -> Option<AxisRange>;
}
