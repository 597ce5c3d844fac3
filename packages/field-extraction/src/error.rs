//! Typed errors for the field extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur during extraction operations.
///
/// Per-field misses (heuristic miss, failed validation, empty model value)
/// are never errors: the field simply ends as `not_found`. Everything here
/// fails the whole request.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Schema rejected before any extraction work began
    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },

    /// The same field name appeared twice in a schema or result
    #[error("duplicate field '{field}'")]
    DuplicateField { field: String },

    /// Document file does not exist
    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    /// Document collaborator failed (unreadable or corrupt file)
    #[error("document error: {0}")]
    Document(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Model collaborator failed (network, malformed response)
    #[error("model error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A collaborator call exceeded its time budget
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Cache or learner storage failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ExtractionError {
    /// Shorthand for a schema rejection.
    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    /// Whether the error came from a collaborator call running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExtractionError::DuplicateField {
            field: "cpf".into(),
        };
        assert_eq!(err.to_string(), "duplicate field 'cpf'");

        let err = ExtractionError::Timeout {
            operation: "model call",
            timeout_ms: 1500,
        };
        assert_eq!(err.to_string(), "model call timed out after 1500ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_boxed_source_preserved() {
        let err = ExtractionError::Model("connection reset".into());
        assert_eq!(err.to_string(), "model error: connection reset");
        assert!(std::error::Error::source(&err).is_some());
    }
}
