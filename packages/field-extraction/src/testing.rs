//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extraction library
//! without making real model calls or reading real files.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{ExtractionError, Result};
use crate::traits::{
    document::DocumentSource,
    model::{LanguageModel, ModelResponse},
};
use crate::types::{
    document::CachedDocument,
    request::{Schema, TableRow},
    result::CallMetadata,
};

const REFINED_MARKER: &str = "(previous example:";

/// A mock language model for testing.
///
/// Returns configurable values per field and records every call.
#[derive(Default, Clone)]
pub struct MockModel {
    /// Values returned whenever the field is requested
    values: Arc<RwLock<HashMap<String, Value>>>,

    /// Values returned only when the description carries a previous example
    refined: Arc<RwLock<HashMap<String, Value>>>,

    /// Answer `fake-<field>` for fields without a configured value
    echo: bool,

    /// Fail every call with this message
    error: Option<String>,

    /// Sleep before answering
    delay: Option<Duration>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockModelCall>>>,
}

/// Record of a call made to the mock model.
#[derive(Debug, Clone)]
pub struct MockModelCall {
    pub label: String,
    pub text: String,
    pub schema: Schema,
    pub table_rows: usize,
}

impl MockModel {
    /// Create a mock that knows no values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers `fake-<field>` for every field.
    pub fn echo() -> Self {
        Self {
            echo: true,
            ..Default::default()
        }
    }

    /// Create a mock whose calls all fail.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Add a value returned whenever `field` is requested.
    pub fn with_value(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.into(), value.into());
        self
    }

    /// Add a value returned only for expanded-context requests.
    pub fn with_refined_value(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.refined
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.into(), value.into());
        self
    }

    /// Delay every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<MockModelCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Every field description sent to the model, in call order.
    pub fn descriptions(&self) -> Vec<String> {
        self.calls()
            .iter()
            .flat_map(|call| {
                call.schema
                    .iter()
                    .map(|(_, description)| description.to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn answer(&self, field: &str, description: &str) -> Option<Value> {
        if description.contains(REFINED_MARKER) {
            let refined = self.refined.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = refined.get(field) {
                return Some(value.clone());
            }
        }

        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values
            .get(field)
            .cloned()
            .or_else(|| self.echo.then(|| Value::String(format!("fake-{}", field))))
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn extract_fields(
        &self,
        text: &str,
        label: &str,
        schema: &Schema,
        tables: &[TableRow],
    ) -> Result<ModelResponse> {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockModelCall {
                label: label.to_string(),
                text: text.to_string(),
                schema: schema.clone(),
                table_rows: tables.len(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.error {
            return Err(ExtractionError::Model(message.clone().into()));
        }

        let values = schema
            .iter()
            .filter_map(|(field, description)| {
                self.answer(field, description)
                    .map(|value| (field.to_string(), value))
            })
            .collect();

        Ok(ModelResponse::new(values).with_metadata(CallMetadata::default().with_model("mock-model")))
    }

    fn model_name(&self) -> Option<&str> {
        Some("mock-model")
    }
}

/// A model that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullModel;

#[async_trait]
impl LanguageModel for NullModel {
    async fn extract_fields(
        &self,
        _text: &str,
        _label: &str,
        _schema: &Schema,
        _tables: &[TableRow],
    ) -> Result<ModelResponse> {
        Ok(ModelResponse::default())
    }
}

/// A mock document source backed by in-memory contents.
#[derive(Default, Clone)]
pub struct MockDocuments {
    documents: Arc<RwLock<HashMap<PathBuf, (String, Vec<TableRow>)>>>,
    parses: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document.
    pub fn with_document(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.with_tables(path, text, Vec::new())
    }

    /// Add a document with table rows.
    pub fn with_tables(self, path: impl Into<PathBuf>, text: impl Into<String>, tables: Vec<TableRow>) -> Self {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), (text.into(), tables));
        self
    }

    /// Number of `extract_text` calls made so far.
    pub fn parse_count(&self) -> usize {
        self.parses.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn get(&self, path: &Path) -> Result<(String, Vec<TableRow>)> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| ExtractionError::DocumentNotFound {
                path: path.display().to_string(),
            })
    }
}

#[async_trait]
impl DocumentSource for MockDocuments {
    async fn fingerprint(&self, path: &Path) -> Result<String> {
        let (text, _) = self.get(path)?;
        Ok(CachedDocument::hash_content(text))
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let (text, _) = self.get(path)?;
        self.parses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        Ok(text)
    }

    async fn extract_tables(&self, path: &Path) -> Result<Vec<TableRow>> {
        Ok(self.get(path)?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_values_and_echo() {
        let model = MockModel::echo().with_value("nome", "Ana");
        let schema = Schema::from_pairs([("nome", "Nome"), ("cpf", "CPF")]).unwrap();

        let response = model.extract_fields("text", "doc", &schema, &[]).await.unwrap();
        assert_eq!(response.get("nome"), Some(&Value::from("Ana")));
        assert_eq!(response.get("cpf"), Some(&Value::from("fake-cpf")));
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.calls()[0].label, "doc");
    }

    #[tokio::test]
    async fn test_mock_documents_missing_path() {
        let docs = MockDocuments::new().with_document("a.txt", "hello");
        assert_eq!(docs.extract_text(Path::new("a.txt")).await.unwrap(), "hello");
        assert!(matches!(
            docs.fingerprint(Path::new("b.txt")).await,
            Err(ExtractionError::DocumentNotFound { .. })
        ));
        assert_eq!(docs.parse_count(), 1);
    }
}
