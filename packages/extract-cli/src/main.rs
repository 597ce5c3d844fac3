mod config;

use anyhow::{Context, Result};
use clap::Parser;
use field_extraction::{
    DocumentInput, ExtractionOrchestrator, ExtractionRequest, MemoryStore, OpenAiModel, Schema,
    TextFileSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CliConfig;

/// Extract named fields from a text document.
#[derive(Parser, Debug)]
#[command(name = "extract", version)]
struct Args {
    /// Document type label (e.g. carteira_oab)
    #[arg(short, long)]
    label: String,

    /// Schema as a JSON object of field -> description, or @path to a JSON file
    #[arg(short, long)]
    schema: String,

    /// Path to the document
    #[arg(short, long)]
    document: PathBuf,

    /// Run the same request this many times (later runs hit the cache)
    #[arg(long, default_value_t = 1)]
    repeat: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,field_extraction=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = CliConfig::from_env()?;

    let schema = load_schema(&args.schema)?;
    let request = ExtractionRequest::new(&args.label, schema, DocumentInput::path(&args.document))?;

    let orchestrator = ExtractionOrchestrator::with_config(
        Arc::new(MemoryStore::new()),
        OpenAiModel::new(config.credentials()?),
        TextFileSource::new(),
        config.extraction_config(),
    );

    for run in 0..args.repeat.max(1) {
        let result = orchestrator
            .extract(&request)
            .await
            .with_context(|| format!("extraction failed for {}", args.document.display()))?;

        tracing::info!(
            run,
            source = ?result.metadata.source,
            model_calls = result.metadata.call_count(),
            "Extraction finished"
        );
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}

/// Parse a schema argument: inline JSON, or `@path` to a JSON file.
fn load_schema(arg: &str) -> Result<Schema> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&json).context("schema must be a non-empty JSON object of strings")
}
