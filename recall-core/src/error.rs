//! Error types for the recall core library.
//!
//! An empty retrieval and a zero-variance scoring dimension are not errors:
//! they surface as an empty result and a neutral 0.5 column respectively.

use thiserror::Error;

/// Top-level error type for all memory operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// A memory type name that is not one of action, dialogue, reflection,
    /// percept.
    #[error("Invalid memory type: '{0}'")]
    InvalidMemoryType(String),

    /// An observation id outside `[0, count)`.
    #[error("Observation not found: {id} (store holds {count})")]
    NotFound {
        /// The requested id.
        id: usize,
        /// Number of observations in the store.
        count: usize,
    },

    /// A collaborator (embedding, importance, keyword) failed every attempt.
    #[error("{service} service unavailable after {attempts} attempts: {last_error}")]
    ExternalServiceUnavailable {
        /// Which collaborator failed.
        service: &'static str,
        /// Attempts made before giving up.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// A single collaborator call failed. Retryable.
    #[error("Service call failed: {0}")]
    Service(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MemoryError>;
