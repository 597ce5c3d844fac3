//! Storage traits for extraction results and parsed documents.
//!
//! The storage layer is split into focused traits:
//! - `ResultCache`: Finished results keyed by label, content hash and schema
//! - `DocumentCache`: Parsed text and tables keyed by content hash only
//! - `ExtractionStore`: Composite trait combining both

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{document::CachedDocument, result::ExtractionResult};

/// Cache for finished extraction results.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Get a result by its composite key (`label:content_hash:fingerprint`).
    async fn get_result(&self, key: &str) -> Result<Option<ExtractionResult>>;

    /// Store a result under its composite key.
    async fn store_result(&self, key: &str, result: &ExtractionResult) -> Result<()>;
}

/// Cache for parsed document content.
#[async_trait]
pub trait DocumentCache: Send + Sync {
    /// Get a parsed document by content hash.
    async fn get_document(&self, content_hash: &str) -> Result<Option<CachedDocument>>;

    /// Store a parsed document.
    async fn store_document(&self, document: &CachedDocument) -> Result<()>;
}

/// Composite storage trait combining both caches.
///
/// This is the main trait used by the orchestrator.
pub trait ExtractionStore: ResultCache + DocumentCache {}

// Blanket implementation: anything implementing both traits is an ExtractionStore
impl<T: ResultCache + DocumentCache> ExtractionStore for T {}

/// Build the result cache key for a request.
pub fn result_key(label: &str, content_hash: &str, fingerprint: &str) -> String {
    format!("{}:{}:{}", label, content_hash, fingerprint)
}
