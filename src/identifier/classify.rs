//! Common / system-reserved classification tables.

use std::sync::LazyLock;

use regex::Regex;

use super::keys::{Chord, Key};

/// Keys that are commonly bound regardless of their shape.
const COMMON_KEYS: &[Key] = &[
    Key::Grave,
    Key::Tab,
    Key::CapsLock,
    Key::NumberLock,
    Key::Pause,
    Key::ScrollLock,
    Key::PrintScreen,
    Key::Home,
    Key::PageUp,
    Key::PageDown,
    Key::End,
    Key::Delete,
    Key::Backspace,
    Key::Minus,
    Key::Equals,
    Key::LeftBracket,
    Key::RightBracket,
    Key::Semicolon,
    Key::Apostrophe,
    Key::Comma,
    Key::Period,
    Key::Slash,
    Key::Backslash,
    Key::Return,
    Key::Escape,
    Key::Space,
    Key::LeftArrow,
    Key::RightArrow,
    Key::UpArrow,
    Key::DownArrow,
    Key::NumberPadPlus,
    Key::NumberPadPeriod,
    Key::Insert,
];

/// Shapes of commonly bound chords, matched against the canonical chord text.
static COMMON_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[A-Z]$",                       // letters
        r"^F[0-9]+$",                     // function keys
        r"^NUM(BER)?PAD[0-9]$",           // numpad digits
        r"^NUM(BER)?PAD[A-Z]+$",          // numpad buttons (NUMBERPADENTER)
        r"^((LEFT|RIGHT)?SHIFT\+)?D[0-9]$", // digits, optionally shifted
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Keys the operating system keeps for itself.
const RESERVED_KEYS: &[Key] = &[
    Key::LeftWindowsKey,
    Key::RightWindowsKey,
    Key::Power,
    Key::Sleep,
    Key::Wake,
];

/// Mouse buttons 0-2 (left, right, middle) are common.
pub const COMMON_MOUSE_BUTTONS: u8 = 3;

pub(super) fn is_common_chord(chord: &Chord) -> bool {
    if let [key] = chord.keys()
        && COMMON_KEYS.contains(key)
    {
        return true;
    }

    let text = chord.to_string();
    COMMON_SHAPES.iter().any(|shape| shape.is_match(&text))
}

pub(super) fn is_reserved_chord(chord: &Chord) -> bool {
    if chord.keys().iter().any(|key| RESERVED_KEYS.contains(key)) {
        return true;
    }

    let alt = chord.contains(Key::LeftAlt) || chord.contains(Key::RightAlt);
    let ctrl = chord.contains(Key::LeftControl) || chord.contains(Key::RightControl);

    match chord.len() {
        // Alt+Tab, Alt+F4, Alt+Esc, Ctrl+Esc
        2 => {
            (alt && (chord.contains(Key::Tab)
                || chord.contains(Key::F4)
                || chord.contains(Key::Escape)))
                || (ctrl && chord.contains(Key::Escape))
        }
        // Ctrl+Alt+Del
        3 => ctrl && alt && chord.contains(Key::Delete),
        _ => false,
    }
}
