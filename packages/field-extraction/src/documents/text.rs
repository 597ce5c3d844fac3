//! Plain-text document source.
//!
//! Reads UTF-8 files from disk. Lines containing tab characters are also
//! reported as table rows, one cell per tab-separated column.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::traits::document::DocumentSource;
use crate::types::{document::CachedDocument, request::TableRow};

/// Document source for text files already produced by an upstream parser.
#[derive(Debug, Clone, Default)]
pub struct TextFileSource;

impl TextFileSource {
    pub fn new() -> Self {
        Self
    }

    async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExtractionError::DocumentNotFound {
                path: path.display().to_string(),
            },
            _ => ExtractionError::Document(Box::new(e)),
        })
    }

    async fn read_text(path: &Path) -> Result<String> {
        let bytes = Self::read_bytes(path).await?;
        String::from_utf8(bytes).map_err(|e| ExtractionError::Document(Box::new(e)))
    }
}

/// Split tab-separated lines into rows. Lines without a tab are prose.
pub fn parse_tab_rows(text: &str) -> Vec<TableRow> {
    text.lines()
        .filter(|line| line.contains('\t'))
        .map(|line| line.split('\t').map(|cell| cell.trim().to_string()).collect())
        .collect()
}

#[async_trait]
impl DocumentSource for TextFileSource {
    async fn fingerprint(&self, path: &Path) -> Result<String> {
        let bytes = Self::read_bytes(path).await?;
        Ok(CachedDocument::hash_content(&bytes))
    }

    async fn extract_text(&self, path: &Path) -> Result<String> {
        let text = Self::read_text(path).await?;
        debug!(path = %path.display(), chars = text.chars().count(), "Read document text");
        Ok(text)
    }

    async fn extract_tables(&self, path: &Path) -> Result<Vec<TableRow>> {
        Ok(parse_tab_rows(&Self::read_text(path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_text_and_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Inscrição 101943\nnome\tANA SILVA\nfim").unwrap();

        let source = TextFileSource::new();
        let text = source.extract_text(file.path()).await.unwrap();
        assert!(text.starts_with("Inscrição"));

        let rows = source.extract_tables(file.path()).await.unwrap();
        assert_eq!(rows, vec![vec!["nome".to_string(), "ANA SILVA".to_string()]]);

        let hash = source.fingerprint(file.path()).await.unwrap();
        assert_eq!(hash, CachedDocument::hash_content(text.as_bytes()));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = TextFileSource::new()
            .extract_text(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::DocumentNotFound { .. }));
    }
}
