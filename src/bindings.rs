//! Binding table: input identifiers mapped to commands.
//!
//! Bindings are validated as a whole and then partitioned by device class so
//! the sample loop only looks at the partition of the device that woke it.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::error::{Error, Result};
use crate::identifier::{Chord, Control, DeviceId, InputIdentifier};

/// Input side of a binding: an identifier, or its persisted text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingInput {
    Identifier(InputIdentifier),
    Text(String),
}

impl From<InputIdentifier> for BindingInput {
    fn from(id: InputIdentifier) -> Self {
        BindingInput::Identifier(id)
    }
}

impl From<&str> for BindingInput {
    fn from(text: &str) -> Self {
        BindingInput::Text(text.to_string())
    }
}

impl From<String> for BindingInput {
    fn from(text: String) -> Self {
        BindingInput::Text(text)
    }
}

/// One input bound to one command.
#[derive(Debug, Clone)]
pub struct Binding<C> {
    pub input: BindingInput,
    pub command: C,
}

impl<C> Binding<C> {
    pub fn new(input: impl Into<BindingInput>, command: C) -> Self {
        Self {
            input: input.into(),
            command,
        }
    }
}

/// Resolves a binding input.
///
/// `Ok(None)` means the binding carries a malformed mouse or joystick number
/// and is skipped without failing the update.
fn resolve_input(input: BindingInput) -> Result<Option<InputIdentifier>> {
    let text = match input {
        BindingInput::Identifier(id) => return Ok(Some(id)),
        BindingInput::Text(text) => text,
    };

    if text.trim().is_empty() {
        return Err(Error::Argument("empty input in bindings collection".to_string()));
    }

    match text.parse::<InputIdentifier>() {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_malformed_number() => {
            debug!("Skipping binding '{}': {}", text, e);
            Ok(None)
        }
        Err(e) => Err(Error::Argument(format!(
            "unrecognized input '{}' in bindings collection: {}",
            text, e
        ))),
    }
}

/// Bindings partitioned by device class.
///
/// Holds the validated source list, which survives
/// [`clear_partitions`](BindingTable::clear_partitions), and the per-class
/// lookup partitions built from it.
#[derive(Debug, Clone)]
pub struct BindingTable<C> {
    entries: Vec<(InputIdentifier, C)>,
    keyboard: BTreeMap<Chord, C>,
    mouse: HashMap<u8, C>,
    joystick: HashMap<DeviceId, BTreeMap<u32, C>>,
}

impl<C: Clone> BindingTable<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            keyboard: BTreeMap::new(),
            mouse: HashMap::new(),
            joystick: HashMap::new(),
        }
    }

    /// Replaces every binding.
    ///
    /// The whole collection is validated before anything changes; on error
    /// the table is left as it was. When the same identifier appears more
    /// than once the last occurrence wins.
    pub fn set_bindings<I>(&mut self, bindings: I) -> Result<()>
    where
        I: IntoIterator<Item = Binding<C>>,
    {
        let mut entries: Vec<(InputIdentifier, C)> = Vec::new();
        let mut positions: HashMap<InputIdentifier, usize> = HashMap::new();

        for binding in bindings {
            let Some(id) = resolve_input(binding.input)? else {
                continue;
            };

            match positions.get(&id) {
                Some(&index) => entries[index].1 = binding.command,
                None => {
                    positions.insert(id.clone(), entries.len());
                    entries.push((id, binding.command));
                }
            }
        }

        self.entries = entries;
        self.rebuild();
        Ok(())
    }

    /// Rebuilds all partitions from the source list.
    pub fn rebuild(&mut self) {
        self.clear_partitions();

        for (id, command) in &self.entries {
            let replaced = match id.control() {
                Control::Keys(chord) => self.keyboard.insert(chord.clone(), command.clone()),
                Control::MouseButton(index) => self.mouse.insert(*index, command.clone()),
                Control::Joystick { offset, .. } => self
                    .joystick
                    .entry(id.device())
                    .or_default()
                    .insert(*offset, command.clone()),
            };

            if replaced.is_some() {
                debug!("Binding for {} replaces an earlier one on the same control", id);
            }
        }
    }

    /// Empties the partitions but keeps the source list.
    pub fn clear_partitions(&mut self) {
        self.keyboard.clear();
        self.mouse.clear();
        self.joystick.clear();
    }

    #[inline]
    pub fn resolve_chord(&self, chord: &Chord) -> Option<&C> {
        self.keyboard.get(chord)
    }

    #[inline]
    pub fn resolve_mouse(&self, button: u8) -> Option<&C> {
        self.mouse.get(&button)
    }

    #[inline]
    pub fn resolve_joystick(&self, device: DeviceId, offset: u32) -> Option<&C> {
        self.joystick.get(&device)?.get(&offset)
    }

    /// Looks up a command by identifier.
    pub fn resolve(&self, id: &InputIdentifier) -> Option<&C> {
        match id.control() {
            Control::Keys(chord) => self.resolve_chord(chord),
            Control::MouseButton(index) => self.resolve_mouse(*index),
            Control::Joystick { offset, .. } => self.resolve_joystick(id.device(), *offset),
        }
    }

    /// Keyboard partition in chord order.
    pub fn chords(&self) -> impl Iterator<Item = (&Chord, &C)> {
        self.keyboard.iter()
    }

    #[inline]
    pub fn has_mouse_bindings(&self) -> bool {
        !self.mouse.is_empty()
    }

    #[inline]
    pub fn has_joystick_bindings(&self) -> bool {
        self.joystick.values().any(|offsets| !offsets.is_empty())
    }

    /// Validated bindings in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&InputIdentifier, &C)> {
        self.entries.iter().map(|(id, command)| (id, command))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Clone> Default for BindingTable<C> {
    fn default() -> Self {
        Self::new()
    }
}
