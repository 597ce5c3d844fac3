//! Per-field decisions and the closed set of value sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What produced a field's value.
///
/// Ordered roughly by cost: cache and heuristics are free, the `Llm*`
/// variants each cost one model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Cache,
    Heuristic,
    HeuristicRetry,
    Template,
    Llm,
    LlmRetry,
    LlmRefined,
    NotFound,
}

impl FieldSource {
    /// Starting confidence before adjustments.
    pub fn base_confidence(self) -> f64 {
        match self {
            Self::Cache => 0.98,
            Self::LlmRefined => 0.90,
            Self::LlmRetry => 0.87,
            Self::Llm => 0.85,
            Self::Template => 0.75,
            Self::HeuristicRetry => 0.68,
            Self::Heuristic => 0.65,
            Self::NotFound => 0.0,
        }
    }

    /// Whether the value came out of a model call.
    pub fn is_model(self) -> bool {
        matches!(self, Self::Llm | Self::LlmRetry | Self::LlmRefined)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Heuristic => "heuristic",
            Self::HeuristicRetry => "heuristic_retry",
            Self::Template => "template",
            Self::Llm => "llm",
            Self::LlmRetry => "llm_retry",
            Self::LlmRefined => "llm_refined",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall classification of where a result's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateSource {
    Cache,
    Heuristic,
    Llm,
    Template,
    Mixed,
    Unknown,
}

impl AggregateSource {
    /// Classify a set of per-field sources.
    ///
    /// `not_found` fields are ignored. A single distinct source maps to
    /// itself when it has an aggregate counterpart; anything else is mixed.
    pub fn classify(sources: impl IntoIterator<Item = FieldSource>) -> Self {
        let mut distinct: Vec<FieldSource> = Vec::new();
        for source in sources {
            if source != FieldSource::NotFound && !distinct.contains(&source) {
                distinct.push(source);
            }
        }

        match distinct.as_slice() {
            [] => Self::Unknown,
            [FieldSource::Heuristic] => Self::Heuristic,
            [FieldSource::Llm] => Self::Llm,
            [FieldSource::Template] => Self::Template,
            _ => Self::Mixed,
        }
    }
}

impl Default for AggregateSource {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The pipeline's current answer for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecision {
    pub field_name: String,

    /// Normalized value; `None` when nothing was found
    pub value: Option<String>,

    pub source: FieldSource,

    /// 0.0 to 0.99
    pub confidence: f64,

    /// Value passed the field-type validator
    pub validated: bool,

    /// Confidence fell below the retry threshold
    pub needs_retry: bool,

    /// Stages that tried this field, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<FieldSource>,
}

impl FieldDecision {
    /// A field with no value yet.
    pub fn unresolved(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: None,
            source: FieldSource::NotFound,
            confidence: 0.0,
            validated: false,
            needs_retry: false,
            attempts: Vec::new(),
        }
    }

    /// A field resolved from `source`.
    pub fn resolved(
        field_name: impl Into<String>,
        value: impl Into<String>,
        source: FieldSource,
        confidence: f64,
        needs_retry: bool,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            value: Some(value.into()),
            source,
            confidence,
            validated: true,
            needs_retry,
            attempts: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Still worth another, more expensive attempt.
    pub fn wants_recovery(&self) -> bool {
        self.value.is_none() || self.needs_retry
    }

    pub fn record_attempt(&mut self, stage: FieldSource) {
        self.attempts.push(stage);
    }

    /// Replace this decision when `candidate` scores at least as high.
    ///
    /// Ties go to the candidate, which always comes from a later (more
    /// expensive) stage. The attempt trail is kept either way. Returns
    /// whether the replacement happened.
    pub fn offer(&mut self, candidate: FieldDecision) -> bool {
        if candidate.value.is_some() && candidate.confidence >= self.confidence {
            let mut attempts = std::mem::take(&mut self.attempts);
            attempts.extend(candidate.attempts.iter().copied());
            *self = candidate;
            self.attempts = attempts;
            true
        } else {
            false
        }
    }
}
