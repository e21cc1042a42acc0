//! LLM error types.

use recall_core::MemoryError;
use thiserror::Error;

/// Errors that can occur during LLM and embedding calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// Response body was not what the endpoint promises.
    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// Provider is unavailable.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}

impl From<LlmError> for MemoryError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ConfigError(msg) => MemoryError::Config(msg),
            other => MemoryError::Service(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_failures_map_to_retryable_memory_errors() {
        let err: MemoryError = LlmError::Timeout(500).into();
        assert!(matches!(err, MemoryError::Service(ref m) if m.contains("500ms")));

        let err: MemoryError = LlmError::ConfigError("no provider".into()).into();
        assert!(matches!(err, MemoryError::Config(_)));
    }
}
