//! Error types for the Host object protocol

/// Result type for Host protocol calls
pub type HostResult<T> = Result<T, HostError>;

/// Host runtime error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// No class registered under this name
    #[error("Class not found: {0}")]
    NoSuchClass(String),

    /// Receiver does not understand the message
    #[error("Object of class {class} does not understand message {message}")]
    NoSuchMethod {
        /// Class of the receiver
        class: String,
        /// Message name as sent
        message: String,
    },

    /// Sequence operation on a value that is not an array
    #[error("Not an array: {0}")]
    NotAnArray(String),

    /// Index outside the sequence bounds
    #[error("Index {index} out of bounds for array of {len} items")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Array length
        len: usize,
    },

    /// A condition raised by Host code
    #[error("{0}")]
    Condition(String),
}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        HostError::Condition(s)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        HostError::Condition(s.to_string())
    }
}
