//! Extraction pipeline - the core of the library.
//!
//! The pipeline runs a cost-ordered cascade per request:
//! - Result cache (label + content hash + schema fingerprint)
//! - Regex heuristics, gated by validation and confidence
//! - One batched model call over a compacted context
//! - Per-field recovery (relaxed heuristics, templates, focused model calls)
//! - Learning and caching of the final result

pub mod confidence;
pub mod context;
pub mod heuristics;
pub mod inflight;
pub mod learner;
pub mod orchestrator;
pub mod profiling;
pub mod prompts;
pub mod recovery;
pub mod validator;

pub use confidence::{is_critical, ConfidenceScorer, CRITICAL_FIELDS};
pub use context::ContextCompactor;
pub use heuristics::{enum_options, HeuristicMatcher, Pattern};
pub use inflight::{InFlight, InFlightGuard};
pub use learner::{generalize, match_template, LearnedPattern, PatternLearner};
pub use orchestrator::ExtractionOrchestrator;
pub use profiling::ProfileCollector;
pub use prompts::{format_field_prompt, EXTRACT_FIELDS_PROMPT};
pub use recovery::{RecoveryCascade, RecoveryInput, RecoveryOutcome};
pub use validator::{Validation, Validator};

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{ExtractionError, Result};
use crate::traits::model::{LanguageModel, ModelResponse};
use crate::types::request::{Schema, TableRow};

/// Await `fut`, failing with `Timeout` once `limit` has passed.
pub(crate) async fn with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ExtractionError::Timeout {
            operation,
            timeout_ms: limit.as_millis() as u64,
        })?
}

/// One bounded model call, with duration and model name filled in when the
/// model did not report them.
pub(crate) async fn call_model<M: LanguageModel + ?Sized>(
    model: &M,
    limit: Duration,
    text: &str,
    label: &str,
    schema: &Schema,
    tables: &[TableRow],
) -> Result<ModelResponse> {
    let started = Instant::now();
    let mut response = with_timeout(
        "model call",
        limit,
        model.extract_fields(text, label, schema, tables),
    )
    .await?;

    let metadata = &mut response.metadata;
    if metadata.duration_ms.is_none() {
        metadata.duration_ms = Some(started.elapsed().as_millis() as u64);
    }
    if metadata.model.is_none() {
        metadata.model = model.model_name().map(str::to_string);
    }
    Ok(response)
}
