//! Document trait for turning files into text and tables.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::request::TableRow;

/// Source of document content.
///
/// Every call is fallible: missing files surface as
/// [`ExtractionError::DocumentNotFound`](crate::error::ExtractionError::DocumentNotFound),
/// unreadable ones as `Document`.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Stable content hash of the file, used as the cache key.
    async fn fingerprint(&self, path: &Path) -> Result<String>;

    /// Full text of the document.
    async fn extract_text(&self, path: &Path) -> Result<String>;

    /// Table rows found in the document (may be empty).
    async fn extract_tables(&self, path: &Path) -> Result<Vec<TableRow>>;
}
