//! Bridge error types

use ferry_guest::{GuestException, TeardownError};
use ferry_host::HostError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced to the Host caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// A Host value with no Guest representation
    #[error("Unsupported host type: {class}")]
    UnsupportedHostType {
        /// Host class of the value
        class: String,
    },

    /// A Guest result with no Host representation
    #[error("Unsupported guest type: {type_name}")]
    UnsupportedGuestType {
        /// Guest type name of the value
        type_name: String,
    },

    /// Name does not resolve to a Guest callable
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Type synthesis was rejected; nothing was registered
    #[error("Class definition failed: {0}")]
    ClassDefinition(String),

    /// An exception raised inside Guest code
    #[error("Guest raised {kind}: {message}")]
    GuestRuntimeFault {
        /// Guest exception class name
        kind: String,
        /// Guest exception message
        message: String,
    },

    /// The Guest runtime did not shut down cleanly
    #[error("Finalize failed: {0}")]
    FinalizeFailure(#[from] TeardownError),

    /// No session is open
    #[error("Bridge is not initialized")]
    NotInitialized,

    /// Error from the Host interpreter
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Invalid bridge configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<GuestException> for BridgeError {
    fn from(e: GuestException) -> Self {
        BridgeError::GuestRuntimeFault {
            kind: e.kind,
            message: e.message,
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        BridgeError::Config(e.to_string())
    }
}

/// Errors raised while Guest code is running (inside a callback) travel
/// back through the Guest runtime as exceptions.
impl From<BridgeError> for GuestException {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::GuestRuntimeFault { kind, message } => GuestException::new(kind, message),
            other => GuestException::runtime_error(other.to_string()),
        }
    }
}

/// Bridge errors reaching Host method bodies (proxy class methods)
impl From<BridgeError> for HostError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Host(inner) => inner,
            other => HostError::Condition(other.to_string()),
        }
    }
}
