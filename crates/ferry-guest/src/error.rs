//! Error types for the Guest runtime

/// Result type for Guest operations
pub type GuestResult<T> = Result<T, GuestException>;

/// An exception raised inside the Guest runtime.
///
/// `kind` is the Guest exception class name (`TypeError`, `NameError`, ...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct GuestException {
    /// Exception class name
    pub kind: String,
    /// Exception message
    pub message: String,
}

impl GuestException {
    /// Create an exception of any kind
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// `TypeError`
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    /// `AttributeError`
    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new("AttributeError", message)
    }

    /// `NameError`
    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new("NameError", message)
    }

    /// `KeyError`
    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new("KeyError", message)
    }

    /// `ValueError`
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    /// `RuntimeError`
    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new("RuntimeError", message)
    }

    /// Check the exception kind
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Failure while shutting the runtime down
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeardownError {
    /// The runtime was never initialized or is already finalized
    #[error("Guest runtime is not initialized")]
    NotInitialized,

    /// Objects were still referenced after module namespaces were cleared
    #[error("{0} guest objects still referenced at teardown")]
    Leaked(usize),
}
