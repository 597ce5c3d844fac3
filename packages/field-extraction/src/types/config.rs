//! Configuration types for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence thresholds below which a field is escalated.
///
/// Critical fields (identity, contact, date, amount) must use the stricter,
/// higher threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Threshold for fields in the critical set.
    ///
    /// Default: 0.75.
    pub critical_threshold: f64,

    /// Threshold for every other field.
    ///
    /// Default: 0.70.
    pub default_threshold: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            critical_threshold: 0.75,
            default_threshold: 0.70,
        }
    }
}

impl RetryPolicy {
    /// Create a policy, keeping the critical threshold at least as strict
    /// as the default one.
    pub fn new(critical_threshold: f64, default_threshold: f64) -> Self {
        Self {
            critical_threshold: critical_threshold.max(default_threshold),
            default_threshold,
        }
    }
}

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Upper bound (in chars) on the document context sent to the model.
    ///
    /// Longer documents are compacted around schema keywords. Default: 2500.
    pub max_context_chars: usize,

    /// Chars kept on each side of a keyword hit during compaction.
    ///
    /// Default: 240.
    pub context_window: usize,

    /// Escalation thresholds.
    pub retry_policy: RetryPolicy,

    /// Time budget for each model call. Default: 60s.
    #[serde(with = "duration_secs")]
    pub model_timeout: Duration,

    /// Time budget for each document collaborator call. Default: 30s.
    #[serde(with = "duration_secs")]
    pub document_timeout: Duration,

    /// Skip heuristics for fields the learner has only seen resolved by the
    /// model. Default: true.
    pub honor_learned_sources: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 2500,
            context_window: 240,
            retry_policy: RetryPolicy::default(),
            model_timeout: Duration::from_secs(60),
            document_timeout: Duration::from_secs(30),
            honor_learned_sources: true,
        }
    }
}

impl ExtractionConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context budget.
    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max;
        self
    }

    /// Set the compaction window.
    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the model call timeout.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Set the document call timeout.
    pub fn with_document_timeout(mut self, timeout: Duration) -> Self {
        self.document_timeout = timeout;
        self
    }

    /// Toggle learned-source heuristic skipping.
    pub fn with_learned_sources(mut self, honor: bool) -> Self {
        self.honor_learned_sources = honor;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_keeps_critical_stricter() {
        let policy = RetryPolicy::new(0.6, 0.8);
        assert!(policy.critical_threshold >= policy.default_threshold);
        assert!(RetryPolicy::default().critical_threshold > RetryPolicy::default().default_threshold);
    }

    #[test]
    fn test_config_roundtrips_timeouts_as_seconds() {
        let config = ExtractionConfig::new().with_model_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["model_timeout"], 1.5);

        let back: ExtractionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.model_timeout, Duration::from_millis(1500));
    }
}
