//! Confidence scoring and the escalation decision.

use crate::types::{config::RetryPolicy, decision::FieldSource};

/// Fields where a wrong value is costly; scored slightly lower and held to
/// the stricter retry threshold.
pub const CRITICAL_FIELDS: &[&str] = &[
    "cpf",
    "cnpj",
    "email",
    "telefone",
    "celular",
    "data",
    "nascimento",
    "emissao",
    "valor",
    "total",
];

const APPROXIMATE_QUALIFIERS: &[&str] = &["aproximad", "approximate"];

/// Exact (lowercased) membership in the critical set.
pub fn is_critical(field: &str) -> bool {
    let lowered = field.to_lowercase();
    CRITICAL_FIELDS.contains(&lowered.as_str())
}

/// Scores resolved values and decides when to escalate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    policy: RetryPolicy,
}

impl ConfidenceScorer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Score a value in `[0.0, 0.99]`, rounded to two decimals.
    pub fn score(
        &self,
        field: &str,
        value: Option<&str>,
        description: &str,
        source: FieldSource,
        context: &str,
        validated: bool,
    ) -> f64 {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            return 0.0;
        };

        let mut score = source.base_confidence();
        if validated {
            score += 0.10;
        }
        if looks_numeric(value) {
            score += 0.03;
        }
        if is_critical(field) {
            score -= 0.02;
        }
        let description = description.to_lowercase();
        if APPROXIMATE_QUALIFIERS.iter().any(|q| description.contains(q)) {
            score -= 0.05;
        }
        if !context.is_empty() && context.chars().count() < 40 {
            score += 0.02;
        }

        (score.clamp(0.0, 0.99) * 100.0).round() / 100.0
    }

    /// Whether `confidence` is too low to keep without a further attempt.
    pub fn should_retry(&self, confidence: f64, field: &str) -> bool {
        let threshold = if is_critical(field) {
            self.policy.critical_threshold
        } else {
            self.policy.default_threshold
        };
        confidence < threshold
    }
}

fn looks_numeric(value: &str) -> bool {
    let mut digits = value
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | ' '))
        .peekable();
    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validated_heuristic_email_is_final() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.score(
            "email",
            Some("jane@example.com"),
            "contact email",
            FieldSource::Heuristic,
            "jane@example.com",
            true,
        );
        assert_eq!(score, 0.75);
        assert!(!scorer.should_retry(score, "email"));
    }

    #[test]
    fn test_approximate_description_escalates() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.score(
            "valor",
            Some("R$ 10,00"),
            "Valor aproximado",
            FieldSource::Heuristic,
            "R$ 10,00",
            true,
        );
        assert_eq!(score, 0.70);
        assert!(scorer.should_retry(score, "valor"));
    }

    #[test]
    fn test_numeric_bonus() {
        let scorer = ConfidenceScorer::default();
        let plain = scorer.score("inscricao", Some("ABC"), "", FieldSource::Llm, "", true);
        let numeric = scorer.score("inscricao", Some("101.943"), "", FieldSource::Llm, "", true);
        assert_eq!(plain, 0.95);
        assert_eq!(numeric, 0.98);
    }

    #[test]
    fn test_cache_clamped() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.score("nome", Some("123"), "", FieldSource::Cache, "123", true);
        assert_eq!(score, 0.99);
    }

    #[test]
    fn test_critical_threshold_is_stricter() {
        let scorer = ConfidenceScorer::default();
        assert!(scorer.should_retry(0.72, "cpf"));
        assert!(!scorer.should_retry(0.72, "nome"));
        assert!(is_critical("CPF"));
        assert!(!is_critical("cpf_titular"));
    }

    proptest! {
        #[test]
        fn prop_score_bounded(
            value in ".{0,40}",
            description in ".{0,40}",
            context in ".{0,80}",
            validated in any::<bool>(),
            source_idx in 0usize..8,
        ) {
            let sources = [
                FieldSource::Cache,
                FieldSource::Heuristic,
                FieldSource::HeuristicRetry,
                FieldSource::Template,
                FieldSource::Llm,
                FieldSource::LlmRetry,
                FieldSource::LlmRefined,
                FieldSource::NotFound,
            ];
            let scorer = ConfidenceScorer::default();
            let score = scorer.score("total", Some(&value), &description, sources[source_idx], &context, validated);
            prop_assert!((0.0..=0.99).contains(&score));
            if value.trim().is_empty() {
                prop_assert_eq!(score, 0.0);
            }
        }

        #[test]
        fn prop_missing_value_scores_zero(validated in any::<bool>()) {
            let scorer = ConfidenceScorer::default();
            prop_assert_eq!(scorer.score("nome", None, "", FieldSource::Cache, "x", validated), 0.0);
        }
    }
}
