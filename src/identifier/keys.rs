//! Keyboard key codes, chords and keyboard snapshots.

use std::fmt;
use std::sync::LazyLock;

use smallvec::SmallVec;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Keyboard key, identified by its hardware scan code.
///
/// Canonical names are the upper-cased variant names (`LEFTSHIFT`, `D1`,
/// `NUMBERPAD0`); parsing them is case-insensitive.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Key {
    Escape = 0x01,
    D1 = 0x02,
    D2 = 0x03,
    D3 = 0x04,
    D4 = 0x05,
    D5 = 0x06,
    D6 = 0x07,
    D7 = 0x08,
    D8 = 0x09,
    D9 = 0x0A,
    D0 = 0x0B,
    Minus = 0x0C,
    Equals = 0x0D,
    Backspace = 0x0E,
    Tab = 0x0F,
    Q = 0x10,
    W = 0x11,
    E = 0x12,
    R = 0x13,
    T = 0x14,
    Y = 0x15,
    U = 0x16,
    I = 0x17,
    O = 0x18,
    P = 0x19,
    LeftBracket = 0x1A,
    RightBracket = 0x1B,
    Return = 0x1C,
    LeftControl = 0x1D,
    A = 0x1E,
    S = 0x1F,
    D = 0x20,
    F = 0x21,
    G = 0x22,
    H = 0x23,
    J = 0x24,
    K = 0x25,
    L = 0x26,
    Semicolon = 0x27,
    Apostrophe = 0x28,
    Grave = 0x29,
    LeftShift = 0x2A,
    Backslash = 0x2B,
    Z = 0x2C,
    X = 0x2D,
    C = 0x2E,
    V = 0x2F,
    B = 0x30,
    N = 0x31,
    M = 0x32,
    Comma = 0x33,
    Period = 0x34,
    Slash = 0x35,
    RightShift = 0x36,
    NumberPadStar = 0x37,
    LeftAlt = 0x38,
    Space = 0x39,
    CapsLock = 0x3A,
    F1 = 0x3B,
    F2 = 0x3C,
    F3 = 0x3D,
    F4 = 0x3E,
    F5 = 0x3F,
    F6 = 0x40,
    F7 = 0x41,
    F8 = 0x42,
    F9 = 0x43,
    F10 = 0x44,
    NumberLock = 0x45,
    ScrollLock = 0x46,
    NumberPad7 = 0x47,
    NumberPad8 = 0x48,
    NumberPad9 = 0x49,
    NumberPadMinus = 0x4A,
    NumberPad4 = 0x4B,
    NumberPad5 = 0x4C,
    NumberPad6 = 0x4D,
    NumberPadPlus = 0x4E,
    NumberPad1 = 0x4F,
    NumberPad2 = 0x50,
    NumberPad3 = 0x51,
    NumberPad0 = 0x52,
    NumberPadPeriod = 0x53,
    Oem102 = 0x56,
    F11 = 0x57,
    F12 = 0x58,
    F13 = 0x64,
    F14 = 0x65,
    F15 = 0x66,
    Kana = 0x70,
    AbntC1 = 0x73,
    Convert = 0x79,
    NoConvert = 0x7B,
    Yen = 0x7D,
    AbntC2 = 0x7E,
    NumberPadEquals = 0x8D,
    PreviousTrack = 0x90,
    At = 0x91,
    Colon = 0x92,
    Underline = 0x93,
    Kanji = 0x94,
    Stop = 0x95,
    Ax = 0x96,
    Unlabeled = 0x97,
    NextTrack = 0x99,
    NumberPadEnter = 0x9C,
    RightControl = 0x9D,
    Mute = 0xA0,
    Calculator = 0xA1,
    PlayPause = 0xA2,
    MediaStop = 0xA4,
    VolumeDown = 0xAE,
    VolumeUp = 0xB0,
    WebHome = 0xB2,
    NumberPadComma = 0xB3,
    NumberPadSlash = 0xB5,
    PrintScreen = 0xB7,
    RightAlt = 0xB8,
    Pause = 0xC5,
    Home = 0xC7,
    UpArrow = 0xC8,
    PageUp = 0xC9,
    LeftArrow = 0xCB,
    RightArrow = 0xCD,
    End = 0xCF,
    DownArrow = 0xD0,
    PageDown = 0xD1,
    Insert = 0xD2,
    Delete = 0xD3,
    LeftWindowsKey = 0xDB,
    RightWindowsKey = 0xDC,
    Applications = 0xDD,
    Power = 0xDE,
    Sleep = 0xDF,
    Wake = 0xE3,
    WebSearch = 0xE5,
    WebFavorites = 0xE6,
    WebRefresh = 0xE7,
    WebStop = 0xE8,
    WebForward = 0xE9,
    WebBack = 0xEA,
    MyComputer = 0xEB,
    Mail = 0xEC,
    MediaSelect = 0xED,
}

/// Modifier keys, in the order they are written into recorded chords.
pub const MODIFIER_KEYS: [Key; 6] = [
    Key::LeftControl,
    Key::RightControl,
    Key::LeftAlt,
    Key::RightAlt,
    Key::LeftShift,
    Key::RightShift,
];

static KEYS_BY_CODE: LazyLock<[Option<Key>; 256]> = LazyLock::new(|| {
    let mut table = [None; 256];
    for key in Key::iter() {
        table[key.code() as usize] = Some(key);
    }
    table
});

impl Key {
    /// Scan code of the key.
    #[inline(always)]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_code(code: u8) -> Option<Key> {
        KEYS_BY_CODE[code as usize]
    }

    /// Canonical upper-case name.
    #[inline]
    pub fn name(self) -> &'static str {
        self.into()
    }

    #[inline]
    pub fn is_modifier(self) -> bool {
        MODIFIER_KEYS.contains(&self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered set of keys that must all be held at once.
#[allow(clippy::len_without_is_empty)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Chord(SmallVec<[Key; 4]>);

impl Chord {
    /// Builds a chord from keys in order. Returns `None` for an empty chord.
    pub fn new<I: IntoIterator<Item = Key>>(keys: I) -> Option<Self> {
        let keys: SmallVec<[Key; 4]> = keys.into_iter().collect();
        if keys.is_empty() {
            None
        } else {
            Some(Self(keys))
        }
    }

    #[inline(always)]
    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn contains(&self, key: Key) -> bool {
        self.0.contains(&key)
    }

    /// True when every key of the chord is pressed in `state`.
    #[inline]
    pub fn is_held(&self, state: &KeyboardState) -> bool {
        self.0.iter().all(|&key| state.is_pressed(key))
    }
}

impl From<Key> for Chord {
    fn from(key: Key) -> Self {
        let mut keys = SmallVec::new();
        keys.push(key);
        Self(keys)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(key.name())?;
        }
        Ok(())
    }
}

/// Snapshot of which keys are held, one bit per scan code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardState {
    bits: [u64; 4],
}

impl KeyboardState {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        let mut state = Self::new();
        for key in keys {
            state.press(key);
        }
        state
    }

    #[inline(always)]
    pub fn press(&mut self, key: Key) {
        let code = key.code() as usize;
        self.bits[code >> 6] |= 1u64 << (code & 63);
    }

    #[inline(always)]
    pub fn release(&mut self, key: Key) {
        let code = key.code() as usize;
        self.bits[code >> 6] &= !(1u64 << (code & 63));
    }

    #[inline(always)]
    pub fn is_pressed(&self, key: Key) -> bool {
        let code = key.code() as usize;
        self.bits[code >> 6] & (1u64 << (code & 63)) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&word| word == 0)
    }

    /// Held keys in declaration order of [`Key`].
    pub fn pressed(&self) -> impl Iterator<Item = Key> + '_ {
        Key::iter().filter(move |&key| self.is_pressed(key))
    }
}
