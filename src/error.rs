//! Error types shared across the controller
//! Transport outcomes, reading rejections and controller failures are all
//! explicit values; nothing here is used as control flow across the
//! transport boundary.

use std::num::ParseIntError;

use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a [`GattTransport`](crate::core::bluetooth::GattTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport has not been initialized")]
    NotInitialized,
    #[error("no device connected")]
    NotConnected,
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),
    #[error("operation failed: {0}")]
    OperationFailed(String),
    #[error("bluetooth backend error: {0}")]
    Backend(String),
}

impl From<bluest::Error> for TransportError {
    fn from(e: bluest::Error) -> Self {
        TransportError::Backend(e.to_string())
    }
}

/// Reasons a data-available payload produced no display update.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadingError {
    #[error("payload is empty")]
    Empty,
    #[error("payload is not an integer: {0}")]
    Parse(#[from] ParseIntError),
    #[error("reading {0} is outside [0, 256)")]
    OutOfRange(i64),
}

/// Errors surfaced to users of the [`ControllerHandle`](crate::core::bluetooth::ControllerHandle).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("unable to initialize bluetooth transport: {0}")]
    TransportInit(TransportError),
    #[error("no actuator characteristic is bound")]
    ActuatorUnavailable,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("controller has shut down")]
    Closed,
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
