//! The orchestrator - main entry point for field extraction.
//!
//! One call to [`ExtractionOrchestrator::extract`] runs the whole cascade for
//! a request: cache check, document resolution, heuristics, one batched model
//! call, per-field recovery, then learning and caching.

use futures::future::join_all;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{ExtractionError, Result};
use crate::pipeline::{
    call_model,
    confidence::ConfidenceScorer,
    context::ContextCompactor,
    heuristics::HeuristicMatcher,
    inflight::InFlight,
    learner::PatternLearner,
    profiling::ProfileCollector,
    recovery::{RecoveryCascade, RecoveryInput},
    validator::Validator,
    with_timeout,
};
use crate::traits::{
    document::DocumentSource,
    model::LanguageModel,
    store::{result_key, ExtractionStore},
};
use crate::types::{
    config::ExtractionConfig,
    decision::{AggregateSource, FieldDecision, FieldSource},
    document::CachedDocument,
    request::{DocumentInput, ExtractionRequest, Schema},
    result::{ExtractionMetadata, ExtractionResult},
};

/// Runs extraction requests against shared cache and learner state.
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = ExtractionOrchestrator::new(
///     Arc::new(MemoryStore::new()),
///     OpenAiModel::from_env()?,
///     TextFileSource::new(),
/// );
///
/// let request = ExtractionRequest::new(
///     "carteira_oab",
///     Schema::from_pairs([("nome", "Nome do profissional"), ("inscricao", "Número de inscrição")])?,
///     DocumentInput::path("oab_1.txt"),
/// )?;
/// let result = orchestrator.extract(&request).await?;
/// ```
pub struct ExtractionOrchestrator<S: ExtractionStore, M: LanguageModel, D: DocumentSource> {
    store: Arc<S>,
    model: M,
    documents: D,
    learner: Arc<PatternLearner>,
    config: ExtractionConfig,
    inflight: InFlight,
    matcher: HeuristicMatcher,
    validator: Validator,
}

impl<S: ExtractionStore, M: LanguageModel, D: DocumentSource> ExtractionOrchestrator<S, M, D> {
    /// Create an orchestrator with default configuration.
    pub fn new(store: Arc<S>, model: M, documents: D) -> Self {
        Self::with_config(store, model, documents, ExtractionConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(store: Arc<S>, model: M, documents: D, config: ExtractionConfig) -> Self {
        Self {
            store,
            model,
            documents,
            learner: Arc::new(PatternLearner::new()),
            config,
            inflight: InFlight::new(),
            matcher: HeuristicMatcher::new(),
            validator: Validator::new(),
        }
    }

    /// Share a learner with other orchestrators.
    pub fn with_learner(mut self, learner: Arc<PatternLearner>) -> Self {
        self.learner = learner;
        self
    }

    pub fn learner(&self) -> &Arc<PatternLearner> {
        &self.learner
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut ExtractionConfig {
        &mut self.config
    }

    /// Extract every schema field from the request's document.
    ///
    /// Concurrent calls for the same label, document and schema run the
    /// pipeline once; the rest are served from the cache.
    pub async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        let request_id = Uuid::now_v7();
        let span = info_span!("extraction", request_id = %request_id, label = %request.label);
        self.run(request, request_id).instrument(span).await
    }

    /// Extract with cancellation support.
    pub async fn extract_with_cancel(
        &self,
        request: &ExtractionRequest,
        cancel: CancellationToken,
    ) -> Result<ExtractionResult> {
        tokio::select! {
            result = self.extract(request) => result,
            _ = cancel.cancelled() => Err(ExtractionError::Cancelled),
        }
    }

    async fn run(&self, request: &ExtractionRequest, request_id: Uuid) -> Result<ExtractionResult> {
        let started = Instant::now();
        let mut profile = ProfileCollector::new();
        let scorer = ConfidenceScorer::new(self.config.retry_policy);
        let label = request.label.as_str();
        let schema = &request.schema;

        info!(fields = schema.len(), "Extraction started");

        let content_hash = self.content_hash(&request.document).await?;
        let key = result_key(label, &content_hash, &schema.fingerprint());
        let _gate = self.inflight.acquire(&key).await;

        // CacheCheck
        let cached = profile
            .track_async("cache_ms", self.store.get_result(&key))
            .await?;
        if let Some(cached) = cached {
            info!(key = %key, "Cache hit");
            profile.record("total_ms", started.elapsed());
            return Ok(retag_cached(cached, request_id, schema, &scorer, &profile));
        }

        let document = profile
            .track_async("document_ms", self.resolve_document(&request.document, &content_hash))
            .await?;
        let text = document.text.as_str();
        let mut metadata = ExtractionMetadata::new(request_id);

        // PrimaryPass
        let mut decisions: IndexMap<String, FieldDecision> = schema
            .field_names()
            .map(|field| (field.to_string(), FieldDecision::unresolved(field)))
            .collect();
        let queued = profile.track("heuristics_ms", || {
            self.primary_pass(label, schema, text, &scorer, &mut decisions)
        });
        debug!(queued = queued.len(), "Heuristic pass complete");

        // ModelBatch
        let learned = self.learner.patterns_for(label);
        if let Some(batch_schema) = schema.subset(queued.iter().map(String::as_str)) {
            let compactor = self.compactor();
            let context = compactor.compact(text, &batch_schema, &learned);
            let response = profile
                .track_async(
                    "llm_batch_ms",
                    call_model(
                        &self.model,
                        self.config.model_timeout,
                        &context,
                        label,
                        &batch_schema,
                        &document.tables,
                    ),
                )
                .await?;
            metadata.merge_call(response.metadata.clone().with_step("batch"));

            for (field, description) in batch_schema.iter() {
                decisions[field].record_attempt(FieldSource::Llm);
                let validation = self.validator.validate_json(field, response.get(field), description);
                let Some(value) = validation.normalized.filter(|_| validation.valid) else {
                    continue;
                };
                let confidence = scorer.score(field, Some(&value), description, FieldSource::Llm, &context, true);
                let needs_retry = scorer.should_retry(confidence, field);
                decisions[field].offer(FieldDecision::resolved(field, value, FieldSource::Llm, confidence, needs_retry));
            }
            debug!(fields = batch_schema.len(), context_chars = context.chars().count(), "Model batch complete");
        }

        // FieldRecovery
        let pending: Vec<(&str, &str)> = schema
            .iter()
            .filter(|(field, _)| decisions[*field].wants_recovery())
            .collect();
        if !pending.is_empty() {
            let cascade = RecoveryCascade::new(
                &self.model,
                &self.learner,
                self.compactor(),
                self.config.model_timeout,
            );
            let attempts = pending.iter().map(|&(field, description)| {
                cascade.recover(RecoveryInput {
                    label,
                    field,
                    description,
                    text,
                    tables: &document.tables,
                })
            });
            let outcomes = profile.track_async("recovery_ms", join_all(attempts)).await;

            for outcome in outcomes {
                let outcome = outcome?;
                for call in outcome.calls {
                    metadata.merge_call(call);
                }
                let field = outcome.field.as_str();
                for &stage in &outcome.attempts {
                    decisions[field].record_attempt(stage);
                }
                let Some(value) = outcome.value else {
                    continue;
                };
                let description = schema.description(field);
                let confidence = scorer.score(field, Some(&value), description, outcome.source, &outcome.context, true);
                let needs_retry = scorer.should_retry(confidence, field);
                decisions[field].offer(FieldDecision::resolved(field, value, outcome.source, confidence, needs_retry));
            }
            debug!(fields = pending.len(), "Recovery complete");
        }

        // Aggregate
        metadata.source = AggregateSource::classify(decisions.values().map(|d| d.source));

        // LearnAndCache
        profile.track("learning_ms", || {
            self.learner.learn(
                label,
                schema,
                decisions
                    .values()
                    .filter_map(|d| d.value.as_deref().map(|v| (d.field_name.as_str(), v, d.source))),
            )
        });

        let mut result = ExtractionResult::new(label, decisions.into_values().collect(), metadata)?;
        profile.record("total_ms", started.elapsed());
        result.metadata.profiling = profile.snapshot();

        self.store.store_result(&key, &result).await?;

        info!(
            source = ?result.metadata.source,
            calls = result.metadata.call_count(),
            resolved = result.results.iter().filter(|d| d.is_resolved()).count(),
            "Extraction complete"
        );
        Ok(result)
    }

    /// Heuristics for every field the learner does not mark as model-only.
    ///
    /// Returns the fields that still need the model, in schema order.
    fn primary_pass(
        &self,
        label: &str,
        schema: &Schema,
        text: &str,
        scorer: &ConfidenceScorer,
        decisions: &mut IndexMap<String, FieldDecision>,
    ) -> Vec<String> {
        let mut queued = Vec::new();

        for (field, description) in schema.iter() {
            if self.config.honor_learned_sources && self.learner.is_model_only(label, field) {
                debug!(field = %field, "Learned as model-only, skipping heuristics");
                queued.push(field.to_string());
                continue;
            }

            decisions[field].record_attempt(FieldSource::Heuristic);
            let hit = self
                .matcher
                .first_match(field, description, text)
                .and_then(|raw| {
                    let validation = self.validator.validate(field, Some(&raw), description);
                    validation.normalized.filter(|_| validation.valid)
                });

            let Some(value) = hit else {
                queued.push(field.to_string());
                continue;
            };

            let confidence = scorer.score(field, Some(&value), description, FieldSource::Heuristic, &value, true);
            let needs_retry = scorer.should_retry(confidence, field);
            debug!(field = %field, confidence, needs_retry, "Heuristic hit");
            if needs_retry {
                queued.push(field.to_string());
            }
            decisions[field].offer(FieldDecision::resolved(field, value, FieldSource::Heuristic, confidence, needs_retry));
        }

        queued
    }

    fn compactor(&self) -> ContextCompactor {
        ContextCompactor::new(self.config.max_context_chars, self.config.context_window)
    }

    async fn content_hash(&self, document: &DocumentInput) -> Result<String> {
        match document {
            DocumentInput::Inline { text, tables } => Ok(CachedDocument::hash_inline(text, tables)),
            DocumentInput::Path(path) => {
                with_timeout(
                    "document fingerprint",
                    self.config.document_timeout,
                    self.documents.fingerprint(path),
                )
                .await
            }
        }
    }

    /// Text and tables for the document, parsing a file only when its
    /// content hash has not been seen before.
    async fn resolve_document(&self, document: &DocumentInput, content_hash: &str) -> Result<CachedDocument> {
        let path = match document {
            DocumentInput::Inline { text, tables } => {
                return Ok(CachedDocument::new(content_hash, text.clone(), tables.clone()));
            }
            DocumentInput::Path(path) => path,
        };

        if let Some(cached) = self.store.get_document(content_hash).await? {
            debug!(path = %path.display(), "Document cache hit");
            return Ok(cached);
        }

        let limit = self.config.document_timeout;
        let text = with_timeout("document text", limit, self.documents.extract_text(path)).await?;
        let tables = with_timeout("document tables", limit, self.documents.extract_tables(path)).await?;
        debug!(path = %path.display(), chars = text.chars().count(), tables = tables.len(), "Document parsed");

        let parsed = CachedDocument::new(content_hash, text, tables);
        self.store.store_document(&parsed).await?;
        Ok(parsed)
    }
}

/// Present a cached result as a fresh response: resolved fields become
/// `cache` with a rescored confidence, metadata starts over.
fn retag_cached(
    mut result: ExtractionResult,
    request_id: Uuid,
    schema: &Schema,
    scorer: &ConfidenceScorer,
    profile: &ProfileCollector,
) -> ExtractionResult {
    for decision in result.results.iter_mut().filter(|d| d.is_resolved()) {
        decision.confidence = scorer.score(
            &decision.field_name,
            decision.value.as_deref(),
            schema.description(&decision.field_name),
            FieldSource::Cache,
            "",
            decision.validated,
        );
        decision.source = FieldSource::Cache;
        decision.needs_retry = false;
    }

    let mut metadata = ExtractionMetadata::new(request_id);
    metadata.source = AggregateSource::Cache;
    metadata.profiling = profile.snapshot();
    result.metadata = metadata;
    result.refresh_flat();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{MockDocuments, MockModel, NullModel};
    use std::time::Duration;

    fn orchestrator<M: LanguageModel>(model: M) -> ExtractionOrchestrator<MemoryStore, M, MockDocuments> {
        ExtractionOrchestrator::new(Arc::new(MemoryStore::new()), model, MockDocuments::new())
    }

    #[tokio::test]
    async fn test_heuristic_hit_skips_model() {
        let orch = orchestrator(MockModel::echo());
        let request = ExtractionRequest::from_text(
            "doc",
            [("cpf", "CPF do titular")],
            "Titular: Ana, CPF 123.456.789-09",
        )
        .unwrap();

        let result = orch.extract(&request).await.unwrap();
        let cpf = result.field("cpf").unwrap();
        assert_eq!(cpf.value.as_deref(), Some("123.456.789-09"));
        assert_eq!(cpf.source, FieldSource::Heuristic);
        assert_eq!(cpf.attempts, vec![FieldSource::Heuristic]);
        assert!(!cpf.needs_retry);
        assert_eq!(result.metadata.source, AggregateSource::Heuristic);
        assert_eq!(orch.model().call_count(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_heuristic_replaced_by_model() {
        let orch = orchestrator(MockModel::new().with_value("valor", "R$ 12,00"));
        let request = ExtractionRequest::from_text(
            "fatura",
            [("valor", "Valor aproximado da fatura")],
            "Total R$ 10,00",
        )
        .unwrap();

        let result = orch.extract(&request).await.unwrap();
        let valor = result.field("valor").unwrap();
        assert_eq!(valor.value.as_deref(), Some("R$ 12,00"));
        assert_eq!(valor.source, FieldSource::Llm);
        assert_eq!(result.metadata.calls[0].step.as_deref(), Some("batch"));
    }

    #[tokio::test]
    async fn test_unresolved_field_ends_not_found() {
        let orch = orchestrator(NullModel);
        let request = ExtractionRequest::from_text("doc", [("nome", "Nome")], "nada").unwrap();

        let result = orch.extract(&request).await.unwrap();
        let nome = result.field("nome").unwrap();
        assert_eq!(nome.source, FieldSource::NotFound);
        assert_eq!(nome.confidence, 0.0);
        assert_eq!(
            nome.attempts,
            vec![
                FieldSource::Heuristic,
                FieldSource::Llm,
                FieldSource::HeuristicRetry,
                FieldSource::LlmRetry,
                FieldSource::LlmRefined,
            ]
        );
        assert_eq!(result.metadata.source, AggregateSource::Unknown);
        // batch + focused + expanded
        assert_eq!(result.metadata.call_count(), 3);
    }

    #[tokio::test]
    async fn test_cache_hit_retags_sources() {
        let orch = orchestrator(MockModel::echo());
        let request = ExtractionRequest::from_text("doc", [("nome", "Nome")], "texto").unwrap();

        let first = orch.extract(&request).await.unwrap();
        let second = orch.extract(&request).await.unwrap();

        assert_eq!(first.value("nome"), second.value("nome"));
        assert_eq!(second.field("nome").unwrap().source, FieldSource::Cache);
        assert_eq!(second.metadata.source, AggregateSource::Cache);
        assert!(second.metadata.calls.is_empty());
        assert_ne!(first.metadata.request_id, second.metadata.request_id);
        assert_eq!(orch.model().call_count(), 1);
    }

    #[tokio::test]
    async fn test_model_timeout_is_fatal() {
        let model = MockModel::echo().with_delay(Duration::from_millis(200));
        let config = ExtractionConfig::new().with_model_timeout(Duration::from_millis(20));
        let orch = ExtractionOrchestrator::with_config(
            Arc::new(MemoryStore::new()),
            model,
            MockDocuments::new(),
            config,
        );
        let request = ExtractionRequest::from_text("doc", [("nome", "Nome")], "texto").unwrap();

        let err = orch.extract(&request).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_cancel() {
        let orch = orchestrator(MockModel::echo().with_delay(Duration::from_secs(5)));
        let request = ExtractionRequest::from_text("doc", [("nome", "Nome")], "texto").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orch.extract_with_cancel(&request, cancel).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Cancelled));
    }

    #[tokio::test]
    async fn test_profiling_phases_recorded() {
        let orch = orchestrator(MockModel::echo());
        let request = ExtractionRequest::from_text("doc", [("nome", "Nome")], "texto").unwrap();

        let result = orch.extract(&request).await.unwrap();
        for phase in ["cache_ms", "document_ms", "heuristics_ms", "llm_batch_ms", "learning_ms", "total_ms"] {
            assert!(result.metadata.profiling.contains_key(phase), "missing {}", phase);
        }
    }
}
