//! Request types - what the caller wants extracted, and from what.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ExtractionError, Result};

/// One table row as extracted from a document (a sequence of cell strings).
pub type TableRow = Vec<String>;

/// Ordered mapping of field name to human-readable description.
///
/// Field names are unique and the schema is never empty; both are checked
/// at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "IndexMap<String, String>",
    into = "IndexMap<String, String>"
)]
pub struct Schema {
    fields: IndexMap<String, String>,
}

impl Schema {
    /// Build a schema from `(field, description)` pairs, rejecting duplicates.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = IndexMap::new();
        for (name, description) in pairs {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(ExtractionError::invalid_schema("field names must not be empty"));
            }
            if fields.contains_key(&name) {
                return Err(ExtractionError::DuplicateField { field: name });
            }
            fields.insert(name, description.into());
        }

        if fields.is_empty() {
            return Err(ExtractionError::invalid_schema("schema has no fields"));
        }

        Ok(Self { fields })
    }

    /// Single-field schema, used for focused recovery calls.
    pub fn single(field: impl Into<String>, description: impl Into<String>) -> Self {
        let mut fields = IndexMap::with_capacity(1);
        fields.insert(field.into(), description.into());
        Self { fields }
    }

    /// Sub-schema containing only the named fields, in this schema's order.
    ///
    /// Returns `None` when no name matches.
    pub fn subset<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let wanted: Vec<&str> = names.into_iter().collect();
        let fields: IndexMap<String, String> = self
            .fields
            .iter()
            .filter(|(name, _)| wanted.contains(&name.as_str()))
            .map(|(name, desc)| (name.clone(), desc.clone()))
            .collect();

        if fields.is_empty() {
            None
        } else {
            Some(Self { fields })
        }
    }

    /// Description for a field (empty string if unknown).
    pub fn description(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    /// Iterate `(field, description)` in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Field names in schema order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Stable fingerprint of the requested field set: sorted names joined by `|`.
    pub fn fingerprint(&self) -> String {
        let mut names: Vec<&str> = self.field_names().collect();
        names.sort_unstable();
        names.join("|")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Borrow the underlying ordered map (for prompt serialization).
    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.fields
    }
}

impl TryFrom<IndexMap<String, String>> for Schema {
    type Error = ExtractionError;

    fn try_from(fields: IndexMap<String, String>) -> Result<Self> {
        Self::from_pairs(fields)
    }
}

impl From<Schema> for IndexMap<String, String> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

/// Where the document content comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentInput {
    /// Already-extracted text (and optional table rows).
    Inline {
        text: String,
        #[serde(default)]
        tables: Vec<TableRow>,
    },

    /// A file resolved through the document collaborator.
    Path(PathBuf),
}

impl DocumentInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Inline {
            text: text.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_tables(text: impl Into<String>, tables: Vec<TableRow>) -> Self {
        Self::Inline {
            text: text.into(),
            tables,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

/// Input for a single extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Identifier of the document type (e.g. `carteira_oab`)
    pub label: String,

    /// Fields to extract, with descriptions
    pub schema: Schema,

    /// Document to extract from
    pub document: DocumentInput,
}

impl ExtractionRequest {
    /// Create a request, validating the label.
    ///
    /// The schema was already validated when it was built.
    pub fn new(label: impl Into<String>, schema: Schema, document: DocumentInput) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(ExtractionError::invalid_schema("label must not be empty"));
        }
        Ok(Self {
            label,
            schema,
            document,
        })
    }

    /// Convenience constructor for inline text and `(field, description)` pairs.
    pub fn from_text<I, K, V>(label: impl Into<String>, pairs: I, text: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(label, Schema::from_pairs(pairs)?, DocumentInput::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_rejects_duplicates() {
        let err = Schema::from_pairs([("nome", "Nome"), ("nome", "Outro")]).unwrap_err();
        assert!(matches!(err, ExtractionError::DuplicateField { field } if field == "nome"));
    }

    #[test]
    fn test_schema_rejects_empty() {
        let pairs: Vec<(String, String)> = vec![];
        assert!(matches!(
            Schema::from_pairs(pairs),
            Err(ExtractionError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = Schema::from_pairs([("nome", "Nome"), ("cpf", "CPF")]).unwrap();
        let b = Schema::from_pairs([("cpf", "CPF"), ("nome", "Nome")]).unwrap();
        assert_eq!(a.fingerprint(), "cpf|nome");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_subset_keeps_schema_order() {
        let schema = Schema::from_pairs([("a", "A"), ("b", "B"), ("c", "C")]).unwrap();
        let sub = schema.subset(["c", "a"]).unwrap();
        assert_eq!(sub.field_names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(schema.subset(["zzz"]).is_none());
    }

    #[test]
    fn test_schema_deserializes_in_order() {
        let schema: Schema = serde_json::from_str(r#"{"z": "last", "a": "first"}"#).unwrap();
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["z", "a"]);
    }

    #[test]
    fn test_schema_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<Schema>("{}").is_err());
    }

    #[test]
    fn test_request_requires_label() {
        let err = ExtractionRequest::from_text("  ", [("nome", "Nome")], "text").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidSchema { .. }));
    }
}
