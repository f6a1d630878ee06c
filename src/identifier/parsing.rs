//! Canonical text form of identifiers and legacy key name support.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use smallvec::SmallVec;

use super::keys::{Chord, Key};
use super::{AxisDirection, Control, DeviceClass, DeviceId, InputIdentifier};
use crate::error::FormatError;

/// Separator between the device id and the control payload.
pub const DEVICE_SEPARATOR: char = '|';
/// Separator between keys of a chord.
pub const KEY_SEPARATOR: char = '+';
/// Separator between a joystick offset and its direction.
pub const DIRECTION_SEPARATOR: char = ';';

/// Key names written by older versions, mapped to current keys.
///
/// Lookup is case-insensitive (keys are stored upper-cased).
pub static LEGACY_KEY_NAMES: LazyLock<HashMap<String, Key>> = LazyLock::new(|| {
    [
        ("Add", Key::NumberPadPlus),
        ("Apps", Key::Applications),
        ("Back", Key::Backspace),
        ("Capital", Key::CapsLock),
        ("Circumflex", Key::PreviousTrack),
        ("Decimal", Key::NumberPadPeriod),
        ("Divide", Key::NumberPadSlash),
        ("Down", Key::DownArrow),
        ("Left", Key::LeftArrow),
        ("LeftMenu", Key::LeftAlt),
        ("LeftWindows", Key::LeftWindowsKey),
        ("Multiply", Key::NumberPadStar),
        ("Next", Key::PageDown),
        ("Numlock", Key::NumberLock),
        ("NumPad0", Key::NumberPad0),
        ("NumPad1", Key::NumberPad1),
        ("NumPad2", Key::NumberPad2),
        ("NumPad3", Key::NumberPad3),
        ("NumPad4", Key::NumberPad4),
        ("NumPad5", Key::NumberPad5),
        ("NumPad6", Key::NumberPad6),
        ("NumPad7", Key::NumberPad7),
        ("NumPad8", Key::NumberPad8),
        ("NumPad9", Key::NumberPad9),
        ("NumPadComma", Key::NumberPadComma),
        ("NumPadEnter", Key::NumberPadEnter),
        ("NumPadEquals", Key::NumberPadEquals),
        ("NumPadMinus", Key::NumberPadMinus),
        ("NumPadPeriod", Key::NumberPadPeriod),
        ("NumPadPlus", Key::NumberPadPlus),
        ("NumPadSlash", Key::NumberPadSlash),
        ("NumPadStar", Key::NumberPadStar),
        ("OEM102", Key::Oem102),
        ("PrevTrack", Key::PreviousTrack),
        ("Prior", Key::PageUp),
        ("Right", Key::RightArrow),
        ("RightMenu", Key::RightAlt),
        ("RightWindows", Key::RightWindowsKey),
        ("Scroll", Key::ScrollLock),
        ("SemiColon", Key::Semicolon),
        ("Subtract", Key::NumberPadMinus),
        ("SysRq", Key::PrintScreen),
        ("Up", Key::UpArrow),
    ]
    .into_iter()
    .map(|(name, key)| (name.to_ascii_uppercase(), key))
    .collect()
});

/// Resolves a key name, accepting legacy aliases before current names.
pub fn key_from_name(name: &str) -> Option<Key> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some(&key) = LEGACY_KEY_NAMES.get(&name.to_ascii_uppercase()) {
        return Some(key);
    }

    Key::from_str(name).ok()
}

/// Parses a `KEY[+KEY...]` payload.
pub fn parse_chord(payload: &str) -> Result<Chord, FormatError> {
    let mut keys: SmallVec<[Key; 4]> = SmallVec::new();
    for part in payload.split(KEY_SEPARATOR) {
        let key = key_from_name(part).ok_or_else(|| FormatError::UnknownKey(part.to_string()))?;
        keys.push(key);
    }
    Chord::new(keys).ok_or(FormatError::EmptyControl)
}

/// Parses a mouse button index.
pub fn parse_mouse_button(payload: &str) -> Result<u8, FormatError> {
    payload
        .trim()
        .parse::<u8>()
        .map_err(|_| FormatError::InvalidNumber(payload.to_string()))
}

/// Parses `offset` or `offset;+` / `offset;-`.
pub fn parse_joystick_control(
    payload: &str,
) -> Result<(u32, Option<AxisDirection>), FormatError> {
    let (offset, direction) = match payload.split_once(DIRECTION_SEPARATOR) {
        Some((offset, direction)) => (offset, Some(direction.trim())),
        None => (payload, None),
    };

    let offset = offset
        .trim()
        .parse::<u32>()
        .map_err(|_| FormatError::InvalidNumber(offset.to_string()))?;

    let direction = match direction {
        None => None,
        Some("+") => Some(AxisDirection::Increasing),
        Some("-") => Some(AxisDirection::Decreasing),
        Some(other) => return Err(FormatError::InvalidDirection(other.to_string())),
    };

    Ok((offset, direction))
}

impl FromStr for DeviceId {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s.trim())
            .map(DeviceId::from_uuid)
            .map_err(|_| FormatError::InvalidDevice(s.to_string()))
    }
}

impl FromStr for InputIdentifier {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (device, payload) = s
            .split_once(DEVICE_SEPARATOR)
            .ok_or(FormatError::MissingSeparator)?;

        let device: DeviceId = device.parse()?;
        if payload.trim().is_empty() {
            return Err(FormatError::EmptyControl);
        }

        let control = match device.class() {
            DeviceClass::Keyboard => Control::Keys(parse_chord(payload)?),
            DeviceClass::Mouse => Control::MouseButton(parse_mouse_button(payload)?),
            DeviceClass::Joystick => {
                let (offset, direction) = parse_joystick_control(payload)?;
                Control::Joystick { offset, direction }
            }
        };

        Ok(InputIdentifier { device, control })
    }
}
