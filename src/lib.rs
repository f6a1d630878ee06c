//! Input binding and dispatch engine.
//!
//! Binds keyboard chords, mouse buttons and joystick objects from every
//! attached device to application commands, and records the next input
//! gesture a user performs for rebinding.

pub mod backend;
pub mod bindings;
pub mod catalog;
pub mod config;
pub mod edge;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod identifier;

pub use backend::memory::{MemoryBackend, MemoryHandle};
#[cfg(windows)]
pub use backend::win32::Win32Backend;
pub use backend::{CooperativeLevel, DeviceBackend, WindowHandle};
pub use bindings::{Binding, BindingInput, BindingTable};
pub use catalog::{DeviceCatalog, DeviceEntry};
pub use config::EngineConfig;
pub use edge::{EdgeDetector, InputState};
pub use engine::{CommandStateChanged, EngineState, InputEngine, ObserverId};
pub use error::{Error, FormatError, Result};
pub use handoff::HandoffQueue;
pub use identifier::{
    AxisDirection, Chord, Classification, Control, DeviceClass, DeviceId, InputIdentifier, Key,
};
