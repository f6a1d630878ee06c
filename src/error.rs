//! Error types for binding, parsing and engine lifecycle.

use std::io;

use thiserror::Error;

use crate::identifier::DeviceId;
use crate::engine::EngineState;

/// Failure to read the canonical `device-id|control` text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("input was in an unrecognized format (missing '|' separator)")]
    MissingSeparator,
    #[error("invalid device id '{0}'")]
    InvalidDevice(String),
    #[error("empty control payload")]
    EmptyControl,
    #[error("unknown key name '{0}'")]
    UnknownKey(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid axis direction '{0}' (expected '+' or '-')")]
    InvalidDirection(String),
}

impl FormatError {
    /// Numeric payload problems on mouse or joystick controls. Bindings that
    /// fail this way are dropped instead of failing the whole update.
    #[inline]
    pub fn is_malformed_number(&self) -> bool {
        matches!(
            self,
            FormatError::InvalidNumber(_) | FormatError::InvalidDirection(_)
        )
    }
}

/// Engine error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("invalid state: expected {expected:?}, engine is {actual:?}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },

    #[error("device {device}: {source}")]
    Device {
        device: DeviceId,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to spawn {name} thread")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
