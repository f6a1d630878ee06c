//! Unit tests for identifier parsing and classification.

use std::str::FromStr;

use super::*;
use crate::error::FormatError;

const PAD: DeviceId = DeviceId::from_u128(0x3c0e4a10_55aa_11ef_8000_444553540000);

fn kbd(payload: &str) -> String {
    format!("{}|{}", DeviceId::SYSTEM_KEYBOARD, payload)
}

fn chord(keys: &[Key]) -> Chord {
    Chord::new(keys.iter().copied()).unwrap()
}

#[test]
fn test_parse_single_key() {
    let id: InputIdentifier = kbd("A").parse().unwrap();
    assert_eq!(id, InputIdentifier::keys(Key::A));
    assert_eq!(id.device(), DeviceId::SYSTEM_KEYBOARD);
    assert_eq!(id.device_class(), DeviceClass::Keyboard);
}

#[test]
fn test_parse_is_case_insensitive() {
    let lower: InputIdentifier = kbd("leftshift+d1").parse().unwrap();
    let upper: InputIdentifier = kbd("LEFTSHIFT+D1").parse().unwrap();
    assert_eq!(lower, upper);
}

#[test]
fn test_parse_legacy_aliases() {
    let cases = [
        ("NumPad0", Key::NumberPad0),
        ("Left", Key::LeftArrow),
        ("Apps", Key::Applications),
        ("SysRq", Key::PrintScreen),
        ("Next", Key::PageDown),
        ("Prior", Key::PageUp),
        ("LeftMenu", Key::LeftAlt),
        ("numpadenter", Key::NumberPadEnter),
    ];

    for (legacy, key) in cases {
        let id: InputIdentifier = kbd(legacy).parse().unwrap();
        assert_eq!(id, InputIdentifier::keys(key), "alias {}", legacy);
    }
}

#[test]
fn test_legacy_alias_inside_chord() {
    let id: InputIdentifier = kbd("LeftShift+Up").parse().unwrap();
    assert_eq!(
        id,
        InputIdentifier::keys(chord(&[Key::LeftShift, Key::UpArrow]))
    );
}

#[test]
fn test_parse_missing_separator() {
    assert_eq!(
        InputIdentifier::from_str("no separator here"),
        Err(FormatError::MissingSeparator)
    );
}

#[test]
fn test_parse_invalid_device() {
    assert!(matches!(
        InputIdentifier::from_str("not-a-guid|A"),
        Err(FormatError::InvalidDevice(_))
    ));
}

#[test]
fn test_parse_unknown_key() {
    assert_eq!(
        InputIdentifier::from_str(&kbd("A+BOGUS")),
        Err(FormatError::UnknownKey("BOGUS".to_string()))
    );
}

#[test]
fn test_parse_empty_payload() {
    assert_eq!(
        InputIdentifier::from_str(&kbd("")),
        Err(FormatError::EmptyControl)
    );
}

#[test]
fn test_parse_mouse_button() {
    let id: InputIdentifier = format!("{}|2", DeviceId::SYSTEM_MOUSE).parse().unwrap();
    assert_eq!(id, InputIdentifier::mouse_button(2));

    let bad = InputIdentifier::from_str(&format!("{}|left", DeviceId::SYSTEM_MOUSE));
    assert!(matches!(bad, Err(ref e) if e.is_malformed_number()));
}

#[test]
fn test_parse_joystick_controls() {
    let plain: InputIdentifier = format!("{}|48", PAD).parse().unwrap();
    assert_eq!(plain, InputIdentifier::joystick(PAD, 48, None));

    let up: InputIdentifier = format!("{}|4;+", PAD).parse().unwrap();
    assert_eq!(
        up,
        InputIdentifier::joystick(PAD, 4, Some(AxisDirection::Increasing))
    );

    let down: InputIdentifier = format!("{}|4;-", PAD).parse().unwrap();
    assert_ne!(up, down);

    let bad = InputIdentifier::from_str(&format!("{}|4;x", PAD));
    assert_eq!(bad, Err(FormatError::InvalidDirection("x".to_string())));
}

#[test]
fn test_parse_accepts_braced_guid() {
    let text = format!("{{{}}}|A", DeviceId::SYSTEM_KEYBOARD);
    let id: InputIdentifier = text.parse().unwrap();
    assert_eq!(id, InputIdentifier::keys(Key::A));
}

#[test]
fn test_format_round_trip() {
    let ids = [
        InputIdentifier::keys(Key::A),
        InputIdentifier::keys(chord(&[Key::LeftControl, Key::LeftShift, Key::F5])),
        InputIdentifier::keys(Key::NumberPadEnter),
        InputIdentifier::mouse_button(0),
        InputIdentifier::mouse_button(7),
        InputIdentifier::joystick(PAD, 0, None),
        InputIdentifier::joystick(PAD, 4, Some(AxisDirection::Increasing)),
        InputIdentifier::joystick(PAD, 8, Some(AxisDirection::Decreasing)),
    ];

    for id in ids {
        let text = id.to_string();
        let parsed: InputIdentifier = text.parse().unwrap();
        assert_eq!(parsed, id, "round trip of {}", text);
    }
}

#[test]
fn test_format_canonical_text() {
    let id = InputIdentifier::keys(chord(&[Key::LeftShift, Key::D1]));
    assert_eq!(
        id.to_string(),
        "6f1d2b61-d5a0-11cf-bfc7-444553540000|LEFTSHIFT+D1"
    );

    let id = InputIdentifier::joystick(PAD, 4, Some(AxisDirection::Decreasing));
    assert!(id.to_string().ends_with("|4;-"));
}

#[test]
fn test_chord_order_is_significant() {
    let a = InputIdentifier::keys(chord(&[Key::A, Key::LeftShift]));
    let b = InputIdentifier::keys(chord(&[Key::LeftShift, Key::A]));
    assert_ne!(a, b);
}

#[test]
fn test_classify_mouse_buttons() {
    for button in 0..3 {
        assert_eq!(
            InputIdentifier::mouse_button(button).classify(),
            Classification::Common
        );
    }
    assert_eq!(
        InputIdentifier::mouse_button(5).classify(),
        Classification::Uncommon
    );
}

#[test]
fn test_classify_common_keys() {
    let common = [
        InputIdentifier::keys(Key::Q),
        InputIdentifier::keys(Key::F11),
        InputIdentifier::keys(Key::NumberPad4),
        InputIdentifier::keys(Key::NumberPadEnter),
        InputIdentifier::keys(Key::D7),
        InputIdentifier::keys(chord(&[Key::LeftShift, Key::D7])),
        InputIdentifier::keys(Key::Tab),
        InputIdentifier::keys(Key::Space),
    ];
    for id in common {
        assert!(id.is_common(), "{} should be common", id);
    }
}

#[test]
fn test_classify_uncommon_keys() {
    let uncommon = [
        InputIdentifier::keys(Key::Kanji),
        InputIdentifier::keys(chord(&[Key::LeftControl, Key::A])),
        InputIdentifier::keys(Key::VolumeUp),
        InputIdentifier::keys(chord(&[Key::LeftControl, Key::D1])),
    ];
    for id in uncommon {
        assert_eq!(id.classify(), Classification::Uncommon, "{}", id);
    }
}

#[test]
fn test_classify_system_reserved() {
    let reserved = [
        InputIdentifier::keys(Key::LeftWindowsKey),
        InputIdentifier::keys(chord(&[Key::LeftAlt, Key::Tab])),
        InputIdentifier::keys(chord(&[Key::RightAlt, Key::F4])),
        InputIdentifier::keys(chord(&[Key::LeftControl, Key::Escape])),
        InputIdentifier::keys(chord(&[Key::LeftControl, Key::LeftAlt, Key::Delete])),
        InputIdentifier::keys(Key::Sleep),
    ];
    for id in reserved {
        assert!(id.is_system_reserved(), "{} should be reserved", id);
        assert!(!id.is_common());
    }
}

#[test]
fn test_joystick_is_never_common() {
    for offset in [0, 4, 48, 200] {
        let id = InputIdentifier::joystick(PAD, offset, None);
        assert_eq!(id.classify(), Classification::Uncommon);
    }
}

#[test]
fn test_classify_is_pure() {
    let a: InputIdentifier = kbd("LEFTSHIFT+D3").parse().unwrap();
    let b: InputIdentifier = kbd("LEFTSHIFT+D3").parse().unwrap();
    assert_eq!(a.classify(), b.classify());
    assert_eq!(a.classify(), a.classify());
}

#[test]
fn test_device_class_from_id() {
    assert_eq!(DeviceId::SYSTEM_KEYBOARD.class(), DeviceClass::Keyboard);
    assert_eq!(DeviceId::SYSTEM_MOUSE.class(), DeviceClass::Mouse);
    assert_eq!(PAD.class(), DeviceClass::Joystick);
}

#[test]
fn test_key_codes_round_trip() {
    use strum::IntoEnumIterator;

    for key in Key::iter() {
        assert_eq!(Key::from_code(key.code()), Some(key));
        assert_eq!(key_from_name(key.name()), Some(key));
    }
    assert_eq!(Key::from_code(0x00), None);
}

#[test]
fn test_keyboard_state_and_chords() {
    let mut state = KeyboardState::from_keys([Key::A]);
    let shifted_a = chord(&[Key::A, Key::LeftShift]);

    assert!(!shifted_a.is_held(&state));
    state.press(Key::LeftShift);
    assert!(shifted_a.is_held(&state));
    state.release(Key::A);
    assert!(!shifted_a.is_held(&state));
    assert_eq!(state.pressed().collect::<Vec<_>>(), vec![Key::LeftShift]);
}

#[test]
fn test_serde_uses_canonical_text() {
    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Stored {
        input: InputIdentifier,
    }

    let stored = Stored {
        input: InputIdentifier::joystick(PAD, 4, Some(AxisDirection::Increasing)),
    };
    let text = toml::to_string(&stored).unwrap();
    assert!(text.contains("|4;+"));

    let back: Stored = toml::from_str(&text).unwrap();
    assert_eq!(back, stored);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic]
fn test_joystick_rejects_system_mouse_id() {
    let _ = InputIdentifier::joystick(DeviceId::SYSTEM_MOUSE, 0, None);
}
