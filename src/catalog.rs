//! Device catalog for presenting identifiers.
//!
//! Filled by the engine at attach time and readable from any thread without
//! taking the engine lock.

use std::sync::Arc;

use crate::backend::{DeviceClass, DeviceId, DeviceObject};
use crate::identifier::{Control, InputIdentifier};

/// What is known about one attached device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub class: DeviceClass,
    pub product_name: Option<String>,
    pub objects: Vec<DeviceObject>,
}

impl DeviceEntry {
    /// Name of the object at `offset`, if the backend reported one.
    pub fn object_name(&self, offset: u32) -> Option<&str> {
        self.objects
            .iter()
            .find(|object| object.offset == offset)
            .and_then(|object| object.name.as_deref())
    }
}

/// Concurrent map of device id to [`DeviceEntry`].
///
/// Clones share the same storage.
pub struct DeviceCatalog {
    entries: Arc<scc::HashMap<DeviceId, DeviceEntry>>,
}

impl DeviceCatalog {
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(scc::HashMap::new()),
        }
    }

    /// Records a device, replacing any earlier entry for the same id.
    pub fn insert(&self, device: DeviceId, entry: DeviceEntry) {
        let _ = self.entries.upsert_sync(device, entry);
    }

    #[inline(always)]
    pub fn get(&self, device: DeviceId) -> Option<DeviceEntry> {
        self.entries.read_sync(&device, |_, entry| entry.clone())
    }

    #[inline(always)]
    pub fn product_name(&self, device: DeviceId) -> Option<String> {
        self.entries
            .read_sync(&device, |_, entry| entry.product_name.clone())
            .flatten()
    }

    #[inline(always)]
    pub fn contains(&self, device: DeviceId) -> bool {
        self.entries.contains_sync(&device)
    }

    pub fn remove(&self, device: DeviceId) -> bool {
        self.entries.remove_sync(&device).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear_sync();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of every cataloged device, in no particular order.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut ids = Vec::with_capacity(self.entries.len());
        self.entries.iter_sync(|id, _| {
            ids.push(*id);
            true
        });
        ids
    }

    /// Human readable name for an identifier.
    ///
    /// Keyboard and mouse identifiers are named without consulting the
    /// catalog. Joystick identifiers use the product and object names the
    /// backend reported, falling back to the raw id and offset.
    pub fn describe(&self, id: &InputIdentifier) -> String {
        match id.control() {
            Control::Keys(chord) => chord.to_string(),
            Control::MouseButton(index) => format!("Mouse {}", index),
            Control::Joystick { offset, direction } => {
                let (device, object) = match self.get(id.device()) {
                    Some(entry) => (
                        entry
                            .product_name
                            .clone()
                            .unwrap_or_else(|| id.device().to_string()),
                        entry
                            .object_name(*offset)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("Object {}", offset)),
                    ),
                    None => (id.device().to_string(), format!("Object {}", offset)),
                };

                match direction {
                    Some(direction) => format!("{} {} {}", device, object, direction.symbol()),
                    None => format!("{} {}", device, object),
                }
            }
        }
    }
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DeviceCatalog {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}
