//! Cascading Field Extraction Library
//!
//! Extracts a caller-defined set of named fields from document text, trying
//! the cheapest strategy first and only paying for a model call when it has
//! to.
//!
//! # Design Philosophy
//!
//! **"Spend model calls only where heuristics can't answer"**
//!
//! - Cache before anything else (label + content hash + schema fingerprint)
//! - Regex heuristics gated by validation and a confidence score
//! - At most one batched model call per request, on a compacted context
//! - Per-field recovery cascade for whatever is still missing
//! - Learn per document type, so later requests skip what never works
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use field_extraction::{ExtractionOrchestrator, ExtractionRequest, MemoryStore};
//! use field_extraction::testing::{MockDocuments, MockModel};
//!
//! let orchestrator = ExtractionOrchestrator::new(
//!     Arc::new(MemoryStore::new()),
//!     MockModel::echo(),
//!     MockDocuments::new(),
//! );
//!
//! let request = ExtractionRequest::from_text(
//!     "doc",
//!     [("email", "contact email")],
//!     "Contact: jane@example.com",
//! )?;
//! let result = orchestrator.extract(&request).await?;
//! assert_eq!(result.value("email"), Some("jane@example.com"));
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (LanguageModel, DocumentSource, ExtractionStore)
//! - [`types`] - Requests, decisions, results and configuration
//! - [`pipeline`] - Heuristics, scoring, learning, compaction, recovery and orchestration
//! - [`stores`] - Storage implementations (MemoryStore)
//! - [`documents`] - Document sources (TextFileSource)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod documents;
pub mod error;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{ExtractionError, Result};
pub use traits::{
    document::DocumentSource,
    model::{LanguageModel, ModelResponse},
    store::{result_key, DocumentCache, ExtractionStore, ResultCache},
};
pub use types::{
    config::{ExtractionConfig, RetryPolicy},
    decision::{AggregateSource, FieldDecision, FieldSource},
    document::CachedDocument,
    request::{DocumentInput, ExtractionRequest, Schema, TableRow},
    result::{CallMetadata, ExtractionMetadata, ExtractionResult},
};

// Re-export the orchestrator and pipeline components
pub use pipeline::{
    ConfidenceScorer, ContextCompactor, ExtractionOrchestrator, HeuristicMatcher, LearnedPattern,
    PatternLearner, ProfileCollector, RecoveryCascade, RecoveryOutcome, Validation, Validator,
};

// Re-export stores and document sources
pub use documents::TextFileSource;
pub use stores::MemoryStore;

pub use security::{ApiKey, ModelCredentials};

#[cfg(feature = "openai")]
pub use ai::OpenAiModel;

// Re-export testing utilities
pub use testing::{MockDocuments, MockModel, NullModel};
