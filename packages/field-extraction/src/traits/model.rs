//! Language model trait for structured field extraction.
//!
//! The model is the expensive end of the cascade. The pipeline calls it once
//! per request for everything heuristics could not resolve, and again per
//! field only during recovery.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{request::Schema, request::TableRow, result::CallMetadata};

/// Raw values returned by one model call.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// Field name to JSON value. Missing keys and `null` both mean "not found".
    pub values: serde_json::Map<String, serde_json::Value>,

    /// Timing and token usage for the call
    pub metadata: CallMetadata,
}

impl ModelResponse {
    /// Create a response from raw values.
    pub fn new(values: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            values,
            metadata: CallMetadata::default(),
        }
    }

    /// Attach call metadata.
    pub fn with_metadata(mut self, metadata: CallMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Raw value for a field, treating `null` as absent.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.values.get(field).filter(|v| !v.is_null())
    }
}

/// Trait for LLM-backed extraction.
///
/// Implementations wrap specific providers and handle prompting and
/// response parsing. Transport or protocol failures are errors; a field the
/// model could not find is just an absent key.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Extract values for every field in `schema` from `text`.
    async fn extract_fields(
        &self,
        text: &str,
        label: &str,
        schema: &Schema,
        tables: &[TableRow],
    ) -> Result<ModelResponse>;

    /// Provider model identifier, when known.
    fn model_name(&self) -> Option<&str> {
        None
    }
}
