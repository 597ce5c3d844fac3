//! Per-field fallback cascade for values the first pass missed.
//!
//! Steps run cheapest first and stop at the first value the validator
//! accepts:
//! 1. relaxed heuristics (`heuristic_retry`)
//! 2. learned template (`template`)
//! 3. focused single-field model call (`llm_retry`)
//! 4. the same call with the learned example in the description (`llm_refined`)

use regex::RegexBuilder;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::{
    call_model,
    context::ContextCompactor,
    heuristics::HeuristicMatcher,
    learner::{match_template, PatternLearner},
    validator::Validator,
};
use crate::traits::model::LanguageModel;
use crate::types::{
    decision::FieldSource,
    request::{Schema, TableRow},
    result::CallMetadata,
};

/// Result of running the cascade for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    pub field: String,

    /// Validated value, or `None` when every step failed
    pub value: Option<String>,

    /// Step that produced the value (`NotFound` when none did)
    pub source: FieldSource,

    /// Metadata for every model call made, successful or not
    pub calls: Vec<CallMetadata>,

    /// Text the value was found in, for scoring
    pub context: String,

    /// Steps tried, in order, including the one that produced the value
    pub attempts: Vec<FieldSource>,
}

impl RecoveryOutcome {
    fn not_found(field: &str, calls: Vec<CallMetadata>, attempts: Vec<FieldSource>) -> Self {
        Self {
            field: field.to_string(),
            value: None,
            source: FieldSource::NotFound,
            calls,
            context: String::new(),
            attempts,
        }
    }

    fn found(
        field: &str,
        value: String,
        source: FieldSource,
        calls: Vec<CallMetadata>,
        context: String,
        attempts: Vec<FieldSource>,
    ) -> Self {
        Self {
            field: field.to_string(),
            value: Some(value),
            source,
            calls,
            context,
            attempts,
        }
    }
}

/// The document a field is being recovered from.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryInput<'a> {
    pub label: &'a str,
    pub field: &'a str,
    pub description: &'a str,
    pub text: &'a str,
    pub tables: &'a [TableRow],
}

/// Runs the fallback steps for one field at a time.
///
/// Reads the learner but never writes it; learning happens once the whole
/// request is done.
pub struct RecoveryCascade<'a, M: LanguageModel + ?Sized> {
    model: &'a M,
    learner: &'a PatternLearner,
    compactor: ContextCompactor,
    model_timeout: Duration,
    matcher: HeuristicMatcher,
    validator: Validator,
}

impl<'a, M: LanguageModel + ?Sized> RecoveryCascade<'a, M> {
    pub fn new(
        model: &'a M,
        learner: &'a PatternLearner,
        compactor: ContextCompactor,
        model_timeout: Duration,
    ) -> Self {
        Self {
            model,
            learner,
            compactor,
            model_timeout,
            matcher: HeuristicMatcher::new(),
            validator: Validator::new(),
        }
    }

    /// Run the cascade. Model failures abort with an error.
    pub async fn recover(&self, input: RecoveryInput<'_>) -> Result<RecoveryOutcome> {
        let RecoveryInput {
            label,
            field,
            description,
            text,
            tables,
        } = input;
        debug!(field = %field, "Recovery started");

        let mut attempts = vec![FieldSource::HeuristicRetry];
        if let Some(value) = self.relaxed_heuristics(field, description, text) {
            if let Some(normalized) = self.accept(field, &value, description) {
                info!(field = %field, "Recovered via heuristic retry");
                return Ok(RecoveryOutcome::found(field, normalized, FieldSource::HeuristicRetry, Vec::new(), value, attempts));
            }
        }

        let example = self.learner.example(label, field);
        if example.is_some() {
            attempts.push(FieldSource::Template);
        }
        if let Some(value) = example.as_deref().and_then(|ex| match_template(ex, text)) {
            if let Some(normalized) = self.accept(field, &value, description) {
                info!(field = %field, "Recovered via learned template");
                return Ok(RecoveryOutcome::found(field, normalized, FieldSource::Template, Vec::new(), value, attempts));
            }
        }

        let focused_description = if description.trim().is_empty() {
            format!("Value for field {}", field)
        } else {
            description.to_string()
        };
        let context = self.compactor.compact(
            text,
            &Schema::single(field, focused_description.clone()),
            &self.learner.patterns_for(label),
        );

        let mut calls = Vec::new();
        let steps = [
            (FieldSource::LlmRetry, "focused", focused_description.clone()),
            (
                FieldSource::LlmRefined,
                "expanded_context",
                match &example {
                    Some(ex) => format!("{} (previous example: {})", focused_description, ex),
                    None => focused_description,
                },
            ),
        ];

        for (source, step, step_description) in steps {
            attempts.push(source);
            let schema = Schema::single(field, step_description);
            let response = call_model(self.model, self.model_timeout, &context, label, &schema, tables).await?;
            calls.push(response.metadata.clone().with_step(step));

            let validation = self.validator.validate_json(field, response.get(field), description);
            if let Some(normalized) = validation.normalized.filter(|_| validation.valid) {
                info!(field = %field, step = %step, "Recovered via model");
                return Ok(RecoveryOutcome::found(field, normalized, source, calls, context, attempts));
            }
        }

        info!(field = %field, "Recovery failed");
        Ok(RecoveryOutcome::not_found(field, calls, attempts))
    }

    fn accept(&self, field: &str, value: &str, description: &str) -> Option<String> {
        let validation = self.validator.validate(field, Some(value), description);
        validation.normalized.filter(|_| validation.valid)
    }

    fn relaxed_heuristics(&self, field: &str, description: &str, text: &str) -> Option<String> {
        self.matcher
            .by_field_name(field, text)
            .or_else(|| self.matcher.by_description(description, text))
            .or_else(|| labelled_value(field, text))
    }
}

/// `<field>: value` on a single line, field matched case-insensitively.
fn labelled_value(field: &str, text: &str) -> Option<String> {
    let pattern = format!(r"{}\s*[:\-]\s*([^\n]+)", regex::escape(field));
    let re = RegexBuilder::new(&pattern).case_insensitive(true).build().ok()?;
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockModel, NullModel};

    fn input<'a>(field: &'a str, description: &'a str, text: &'a str) -> RecoveryInput<'a> {
        RecoveryInput {
            label: "doc",
            field,
            description,
            text,
            tables: &[],
        }
    }

    #[tokio::test]
    async fn test_labelled_line_recovered_without_model() {
        let learner = PatternLearner::new();
        let model = MockModel::new();
        let cascade = RecoveryCascade::new(&model, &learner, ContextCompactor::default(), Duration::from_secs(1));

        let outcome = cascade
            .recover(input("situacao", "Situação do cadastro", "Situacao: REGULAR\nfim"))
            .await
            .unwrap();

        assert_eq!(outcome.value.as_deref(), Some("REGULAR"));
        assert_eq!(outcome.source, FieldSource::HeuristicRetry);
        assert!(outcome.calls.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_template_with_null_model() {
        let learner = PatternLearner::new();
        let schema = Schema::single("codigo", "Código interno");
        learner.learn("doc", &schema, [("codigo", "ABC-1234", FieldSource::Llm)]);

        let cascade = RecoveryCascade::new(&NullModel, &learner, ContextCompactor::default(), Duration::from_secs(1));
        let outcome = cascade
            .recover(input("codigo", "Código interno", "Código localizado: ABC-5678\nOutro dado."))
            .await
            .unwrap();

        assert_eq!(outcome.value.as_deref(), Some("ABC-5678"));
        assert_eq!(outcome.source, FieldSource::Template);
        assert!(outcome.calls.is_empty());
        assert_eq!(outcome.attempts, vec![FieldSource::HeuristicRetry, FieldSource::Template]);
    }

    #[tokio::test]
    async fn test_focused_call_records_step() {
        let learner = PatternLearner::new();
        let model = MockModel::new().with_value("nome", "ANA");
        let cascade = RecoveryCascade::new(&model, &learner, ContextCompactor::default(), Duration::from_secs(1));

        let outcome = cascade.recover(input("nome", "Nome", "sem dados")).await.unwrap();
        assert_eq!(outcome.source, FieldSource::LlmRetry);
        assert_eq!(outcome.calls.len(), 1);
        assert_eq!(outcome.calls[0].step.as_deref(), Some("focused"));
    }

    #[tokio::test]
    async fn test_refined_call_sees_previous_example() {
        let learner = PatternLearner::new();
        learner.learn("doc", &Schema::single("nome", "Nome"), [("nome", "JOANA", FieldSource::Llm)]);
        let model = MockModel::new().with_refined_value("nome", "MARIA");
        let cascade = RecoveryCascade::new(&model, &learner, ContextCompactor::default(), Duration::from_secs(1));

        let outcome = cascade.recover(input("nome", "Nome", "--- 0000 ---")).await.unwrap();
        assert_eq!(outcome.value.as_deref(), Some("MARIA"));
        assert_eq!(outcome.source, FieldSource::LlmRefined);
        assert_eq!(outcome.calls.len(), 2);
        assert!(model.descriptions().iter().any(|d| d.contains("(previous example: JOANA)")));
    }

    #[tokio::test]
    async fn test_all_steps_fail() {
        let learner = PatternLearner::new();
        let cascade = RecoveryCascade::new(&NullModel, &learner, ContextCompactor::default(), Duration::from_secs(1));
        let outcome = cascade.recover(input("nome", "", "nada aqui")).await.unwrap();

        assert_eq!(outcome.source, FieldSource::NotFound);
        assert!(outcome.value.is_none());
        assert_eq!(outcome.calls.len(), 2);
        // no learned example, so the template step is skipped
        assert_eq!(
            outcome.attempts,
            vec![FieldSource::HeuristicRetry, FieldSource::LlmRetry, FieldSource::LlmRefined]
        );
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let learner = PatternLearner::new();
        let model = MockModel::failing("upstream down");
        let cascade = RecoveryCascade::new(&model, &learner, ContextCompactor::default(), Duration::from_secs(1));
        let err = cascade.recover(input("nome", "Nome", "x")).await.unwrap_err();
        assert!(matches!(err, crate::error::ExtractionError::Model(_)));
    }
}
