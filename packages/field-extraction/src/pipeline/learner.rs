//! Per-document-type memory of how each field was last resolved.
//!
//! Learned examples feed three things: template recovery, context
//! compaction keywords, and skipping heuristics for fields that only the
//! model has ever resolved.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::types::{decision::FieldSource, request::Schema};

/// Default cap on distinct labels.
pub const MAX_LABELS: usize = 100;

/// Default cap on distinct fields per label.
pub const MAX_FIELDS_PER_LABEL: usize = 50;

/// What the learner remembers about one (label, field) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Most recent value seen for the field
    pub example: String,

    pub description: String,

    pub last_source: FieldSource,
}

type PatternMap = HashMap<String, HashMap<String, LearnedPattern>>;

/// Bounded, thread-safe pattern store.
///
/// Once a cap is reached, new labels (or new fields of a full label) are
/// ignored. Keys already present keep updating.
#[derive(Debug)]
pub struct PatternLearner {
    patterns: RwLock<PatternMap>,
    max_labels: usize,
    max_fields_per_label: usize,
}

impl Default for PatternLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLearner {
    pub fn new() -> Self {
        Self::with_caps(MAX_LABELS, MAX_FIELDS_PER_LABEL)
    }

    pub fn with_caps(max_labels: usize, max_fields_per_label: usize) -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            max_labels,
            max_fields_per_label,
        }
    }

    // Entries are plain data; a panic mid-write can't leave them inconsistent.
    fn read(&self) -> RwLockReadGuard<'_, PatternMap> {
        self.patterns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PatternMap> {
        self.patterns.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record every non-empty value with the source that produced it.
    pub fn learn<'a>(
        &self,
        label: &str,
        schema: &Schema,
        values: impl IntoIterator<Item = (&'a str, &'a str, FieldSource)>,
    ) {
        let mut patterns = self.write();

        if !patterns.contains_key(label) && patterns.len() >= self.max_labels {
            debug!(label = %label, "Learner label cap reached");
            return;
        }
        let fields = patterns.entry(label.to_string()).or_default();

        for (field, value, source) in values {
            if value.trim().is_empty() || source == FieldSource::NotFound {
                continue;
            }
            if !fields.contains_key(field) && fields.len() >= self.max_fields_per_label {
                debug!(label = %label, field = %field, "Learner field cap reached");
                continue;
            }
            fields.insert(
                field.to_string(),
                LearnedPattern {
                    example: value.to_string(),
                    description: schema.description(field).to_string(),
                    last_source: source,
                },
            );
        }

        if fields.is_empty() {
            patterns.remove(label);
        }
    }

    /// Snapshot of the patterns learned for `label`.
    pub fn patterns_for(&self, label: &str) -> HashMap<String, LearnedPattern> {
        self.read().get(label).cloned().unwrap_or_default()
    }

    /// Example value for one field, if learned.
    pub fn example(&self, label: &str, field: &str) -> Option<String> {
        self.read()
            .get(label)
            .and_then(|fields| fields.get(field))
            .map(|p| p.example.clone())
    }

    /// Source that last resolved the field. `None` when unknown.
    pub fn suggested_source(&self, label: &str, field: &str) -> Option<FieldSource> {
        self.read()
            .get(label)
            .and_then(|fields| fields.get(field))
            .map(|p| p.last_source)
    }

    /// Whether only the model has resolved this field so far.
    pub fn is_model_only(&self, label: &str, field: &str) -> bool {
        self.suggested_source(label, field)
            .is_some_and(FieldSource::is_model)
    }

    pub fn label_count(&self) -> usize {
        self.read().len()
    }
}

/// Turn a literal example into a pattern tolerant to digit and letter
/// changes. `ABC-1234` becomes `\p{Lu}\p{Lu}\p{Lu}\-\d\d\d\d`.
pub fn generalize(example: &str) -> Option<String> {
    if example.is_empty() {
        return None;
    }

    let mut pattern = String::with_capacity(example.len() * 4);
    let mut in_whitespace = false;
    for c in example.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                pattern.push_str(r"\s+");
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if c.is_ascii_digit() {
            pattern.push_str(r"\d");
        } else if c.is_uppercase() {
            pattern.push_str(r"\p{Lu}");
        } else if c.is_lowercase() {
            pattern.push_str(r"\p{Ll}");
        } else if c.is_alphabetic() {
            pattern.push_str(r"\p{L}");
        } else {
            pattern.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
        }
    }
    Some(pattern)
}

/// Search `text` for something shaped like `example`, case-insensitively.
pub fn match_template(example: &str, text: &str) -> Option<String> {
    let pattern = generalize(example)?;
    let re = Regex::new(&format!("(?i){}", pattern)).ok()?;
    re.find(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}
