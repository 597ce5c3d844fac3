//! Result types returned to callers.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::error::{ExtractionError, Result};
use crate::types::decision::{AggregateSource, FieldDecision};

/// Statistics for a single model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,

    /// Pipeline step that made the call (`batch`, `focused`, `expanded_context`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl CallMetadata {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }
}

/// Diagnostic metadata returned with each extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub request_id: Uuid,

    /// Model used by the most recent call
    pub model: Option<String>,

    /// Summed model time in milliseconds
    pub duration_ms: Option<u64>,

    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,

    /// Every model call made for this request, in order
    #[serde(default)]
    pub calls: Vec<CallMetadata>,

    pub source: AggregateSource,

    /// Per-phase execution timings in milliseconds
    #[serde(default)]
    pub profiling: BTreeMap<String, u64>,

    pub extracted_at: DateTime<Utc>,
}

impl Default for ExtractionMetadata {
    fn default() -> Self {
        Self::new(Uuid::now_v7())
    }
}

impl ExtractionMetadata {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            model: None,
            duration_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            calls: Vec::new(),
            source: AggregateSource::Unknown,
            profiling: BTreeMap::new(),
            extracted_at: Utc::now(),
        }
    }

    /// Fold one model call into the aggregate counters.
    pub fn merge_call(&mut self, call: CallMetadata) {
        if call.model.is_some() {
            self.model = call.model.clone();
        }
        add_optional(&mut self.duration_ms, call.duration_ms);
        add_optional(&mut self.prompt_tokens, call.prompt_tokens);
        add_optional(&mut self.completion_tokens, call.completion_tokens);
        add_optional(&mut self.total_tokens, call.total_tokens);
        self.calls.push(call);
    }

    /// Number of model calls made for this request.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

fn add_optional(total: &mut Option<u64>, value: Option<u64>) {
    if let Some(value) = value {
        *total = Some(total.unwrap_or(0).saturating_add(value));
    }
}

/// Response for one extraction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub label: String,

    /// One decision per schema field, in schema order
    pub results: Vec<FieldDecision>,

    pub metadata: ExtractionMetadata,

    /// Shallow mapping of field name to extracted value
    pub flat: IndexMap<String, Option<String>>,
}

impl ExtractionResult {
    /// Build a result, guarding against duplicated field names.
    pub fn new(
        label: impl Into<String>,
        results: Vec<FieldDecision>,
        metadata: ExtractionMetadata,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(results.len());
        for decision in &results {
            if !seen.insert(decision.field_name.as_str()) {
                return Err(ExtractionError::DuplicateField {
                    field: decision.field_name.clone(),
                });
            }
        }

        let flat = results
            .iter()
            .map(|d| (d.field_name.clone(), d.value.clone()))
            .collect();

        Ok(Self {
            label: label.into(),
            results,
            metadata,
            flat,
        })
    }

    /// Decision for a field, if it was requested.
    pub fn field(&self, name: &str) -> Option<&FieldDecision> {
        self.results.iter().find(|d| d.field_name == name)
    }

    /// Value for a field, if one was found.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.flat.get(name).and_then(|v| v.as_deref())
    }

    /// Re-derive the flat projection after decisions were edited in place.
    pub(crate) fn refresh_flat(&mut self) {
        self.flat = self
            .results
            .iter()
            .map(|d| (d.field_name.clone(), d.value.clone()))
            .collect();
    }
}
