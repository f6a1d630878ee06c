//! Input identifiers: one physical control on one device.
//!
//! The canonical text form is `device-id|control`, where the device id is a
//! GUID and the control payload depends on the device class:
//!
//! * keyboard: `KEY[+KEY...]`, e.g. `LEFTSHIFT+D1`
//! * mouse: the button index, e.g. `0`
//! * joystick: the object offset, optionally with a direction, e.g. `4;+`

mod classify;
mod keys;
mod parsing;
#[cfg(test)]
mod tests;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub use classify::COMMON_MOUSE_BUTTONS;
pub use keys::{Chord, Key, KeyboardState, MODIFIER_KEYS};
pub use parsing::{
    DEVICE_SEPARATOR, DIRECTION_SEPARATOR, KEY_SEPARATOR, LEGACY_KEY_NAMES, key_from_name,
};

/// Stable device handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// The system keyboard. Identifiers on this device carry key chords.
    pub const SYSTEM_KEYBOARD: DeviceId =
        DeviceId(Uuid::from_u128(0x6f1d2b61_d5a0_11cf_bfc7_444553540000));
    /// The system mouse. Identifiers on this device carry button indices.
    pub const SYSTEM_MOUSE: DeviceId =
        DeviceId(Uuid::from_u128(0x6f1d2b60_d5a0_11cf_bfc7_444553540000));

    #[inline]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Device class implied by the id. Every id other than the system
    /// keyboard and mouse names a joystick.
    #[inline]
    pub fn class(&self) -> DeviceClass {
        if *self == Self::SYSTEM_KEYBOARD {
            DeviceClass::Keyboard
        } else if *self == Self::SYSTEM_MOUSE {
            DeviceClass::Mouse
        } else {
            DeviceClass::Joystick
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Keyboard,
    Mouse,
    Joystick,
}

/// Direction of a recorded axis movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisDirection {
    Increasing,
    Decreasing,
}

impl AxisDirection {
    #[inline]
    pub fn symbol(self) -> char {
        match self {
            AxisDirection::Increasing => '+',
            AxisDirection::Decreasing => '-',
        }
    }
}

/// Which control on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Control {
    /// Keys held together. Order is significant.
    Keys(Chord),
    /// Mouse button by index (0 = left, 1 = right, 2 = middle).
    MouseButton(u8),
    /// Joystick object by data offset.
    Joystick {
        offset: u32,
        direction: Option<AxisDirection>,
    },
}

/// How likely an input is to be bound by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Common,
    Uncommon,
    SystemReserved,
}

/// Immutable identifier of one physical control.
///
/// Equality and hashing are structural over device and control.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputIdentifier {
    device: DeviceId,
    control: Control,
}

impl InputIdentifier {
    /// Keys on the system keyboard.
    pub fn keys(chord: impl Into<Chord>) -> Self {
        Self {
            device: DeviceId::SYSTEM_KEYBOARD,
            control: Control::Keys(chord.into()),
        }
    }

    /// A button on the system mouse.
    pub fn mouse_button(index: u8) -> Self {
        Self {
            device: DeviceId::SYSTEM_MOUSE,
            control: Control::MouseButton(index),
        }
    }

    /// A joystick object. `device` must not be the system keyboard or mouse
    /// id, otherwise the text form parses back as a key or mouse control.
    ///
    /// # Panics
    ///
    /// Debug builds panic when `device` is the system keyboard or mouse id.
    pub fn joystick(device: DeviceId, offset: u32, direction: Option<AxisDirection>) -> Self {
        debug_assert_eq!(device.class(), DeviceClass::Joystick);
        Self {
            device,
            control: Control::Joystick { offset, direction },
        }
    }

    #[inline(always)]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    #[inline(always)]
    pub fn control(&self) -> &Control {
        &self.control
    }

    #[inline]
    pub fn device_class(&self) -> DeviceClass {
        match self.control {
            Control::Keys(_) => DeviceClass::Keyboard,
            Control::MouseButton(_) => DeviceClass::Mouse,
            Control::Joystick { .. } => DeviceClass::Joystick,
        }
    }

    pub fn classify(&self) -> Classification {
        match &self.control {
            Control::Keys(chord) => {
                if classify::is_reserved_chord(chord) {
                    Classification::SystemReserved
                } else if classify::is_common_chord(chord) {
                    Classification::Common
                } else {
                    Classification::Uncommon
                }
            }
            Control::MouseButton(index) if *index < COMMON_MOUSE_BUTTONS => {
                Classification::Common
            }
            Control::MouseButton(_) | Control::Joystick { .. } => Classification::Uncommon,
        }
    }

    #[inline]
    pub fn is_common(&self) -> bool {
        self.classify() == Classification::Common
    }

    #[inline]
    pub fn is_system_reserved(&self) -> bool {
        self.classify() == Classification::SystemReserved
    }
}

impl fmt::Display for InputIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.device, DEVICE_SEPARATOR)?;
        match &self.control {
            Control::Keys(chord) => write!(f, "{}", chord),
            Control::MouseButton(index) => write!(f, "{}", index),
            Control::Joystick {
                offset,
                direction: None,
            } => write!(f, "{}", offset),
            Control::Joystick {
                offset,
                direction: Some(direction),
            } => write!(f, "{}{}{}", offset, DIRECTION_SEPARATOR, direction.symbol()),
        }
    }
}

impl Serialize for InputIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InputIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
