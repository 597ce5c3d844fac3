//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{ExtractionError, Result};
use crate::traits::store::{DocumentCache, ResultCache};
use crate::types::{document::CachedDocument, result::ExtractionResult};

/// In-memory storage for results and parsed documents.
///
/// Useful for testing and single-process deployments. Data is lost on
/// restart.
pub struct MemoryStore {
    results: RwLock<HashMap<String, ExtractionResult>>,
    documents: RwLock<HashMap<String, CachedDocument>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> ExtractionError {
    ExtractionError::Storage("memory store lock poisoned".into())
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            results: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Clear all stored data.
    pub fn clear(&self) -> Result<()> {
        self.results.write().map_err(poisoned)?.clear();
        self.documents.write().map_err(poisoned)?.clear();
        Ok(())
    }

    /// Get the number of stored results.
    pub fn result_count(&self) -> usize {
        self.results.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Get the number of stored documents.
    pub fn document_count(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ResultCache for MemoryStore {
    async fn get_result(&self, key: &str) -> Result<Option<ExtractionResult>> {
        Ok(self.results.read().map_err(poisoned)?.get(key).cloned())
    }

    async fn store_result(&self, key: &str, result: &ExtractionResult) -> Result<()> {
        self.results
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), result.clone());
        Ok(())
    }
}

#[async_trait]
impl DocumentCache for MemoryStore {
    async fn get_document(&self, content_hash: &str) -> Result<Option<CachedDocument>> {
        Ok(self
            .documents
            .read()
            .map_err(poisoned)?
            .get(content_hash)
            .cloned())
    }

    async fn store_document(&self, document: &CachedDocument) -> Result<()> {
        self.documents
            .write()
            .map_err(poisoned)?
            .insert(document.content_hash.clone(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decision::{FieldDecision, FieldSource};
    use crate::types::result::ExtractionMetadata;

    #[tokio::test]
    async fn test_result_roundtrip() {
        let store = MemoryStore::new();
        let result = ExtractionResult::new(
            "oab",
            vec![FieldDecision::resolved("nome", "Ana", FieldSource::Llm, 0.9, false)],
            ExtractionMetadata::default(),
        )
        .unwrap();

        store.store_result("oab:abc:nome", &result).await.unwrap();
        assert_eq!(store.result_count(), 1);

        let retrieved = store.get_result("oab:abc:nome").await.unwrap();
        assert_eq!(retrieved.unwrap().value("nome"), Some("Ana"));

        // Different fingerprint misses
        assert!(store.get_result("oab:abc:cpf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_document_keyed_by_hash() {
        let store = MemoryStore::new();
        let doc = CachedDocument::new("hash123", "Some text", vec![vec!["a".into(), "b".into()]]);

        store.store_document(&doc).await.unwrap();

        let retrieved = store.get_document("hash123").await.unwrap().unwrap();
        assert_eq!(retrieved.text, "Some text");
        assert_eq!(retrieved.tables.len(), 1);
        assert!(store.get_document("other").await.unwrap().is_none());

        store.clear().unwrap();
        assert_eq!(store.document_count(), 0);
    }
}
