//! Document types - extracted text and tables, cached by content hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::request::TableRow;

/// Text and table rows extracted from one document.
///
/// Keyed by content hash alone, so a document parsed for one schema is
/// reused by requests with a different schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDocument {
    /// SHA-256 hash of the document
    pub content_hash: String,

    pub text: String,

    #[serde(default)]
    pub tables: Vec<TableRow>,

    /// When the document was parsed
    pub extracted_at: DateTime<Utc>,
}

impl CachedDocument {
    /// Create a cached document.
    pub fn new(content_hash: impl Into<String>, text: impl Into<String>, tables: Vec<TableRow>) -> Self {
        Self {
            content_hash: content_hash.into(),
            text: text.into(),
            tables,
            extracted_at: Utc::now(),
        }
    }

    /// Calculate SHA-256 hash of content.
    pub fn hash_content(content: impl AsRef<[u8]>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_ref());
        format!("{:x}", hasher.finalize())
    }

    /// Hash of inline text plus its table rows.
    ///
    /// Cells are length-prefixed so no two distinct tables collide. Without
    /// tables this equals [`CachedDocument::hash_content`] of the text.
    pub fn hash_inline(text: &str, tables: &[TableRow]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        for row in tables {
            hasher.update((row.len() as u64).to_le_bytes());
            for cell in row {
                hasher.update((cell.len() as u64).to_le_bytes());
                hasher.update(cell.as_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex() {
        let a = CachedDocument::hash_content("Contact: jane@example.com");
        let b = CachedDocument::hash_content(b"Contact: jane@example.com".as_slice());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, CachedDocument::hash_content("other"));
    }

    #[test]
    fn test_inline_hash_covers_tables() {
        let text = "same text";
        let ana = vec![vec!["nome".to_string(), "ANA".to_string()]];
        let bia = vec![vec!["nome".to_string(), "BIA".to_string()]];
        let split = vec![vec!["nom".to_string(), "eANA".to_string()]];

        assert_eq!(CachedDocument::hash_inline(text, &[]), CachedDocument::hash_content(text));
        assert_eq!(CachedDocument::hash_inline(text, &ana), CachedDocument::hash_inline(text, &ana));
        assert_ne!(CachedDocument::hash_inline(text, &ana), CachedDocument::hash_inline(text, &bia));
        assert_ne!(CachedDocument::hash_inline(text, &ana), CachedDocument::hash_inline(text, &split));
        assert_ne!(CachedDocument::hash_inline(text, &ana), CachedDocument::hash_content(text));
    }
}
