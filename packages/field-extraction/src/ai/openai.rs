//! OpenAI implementation of the `LanguageModel` trait.
//!
//! Uses chat completions in JSON mode, one request per call.
//!
//! # Example
//!
//! ```rust,ignore
//! use field_extraction::ai::OpenAiModel;
//! use field_extraction::security::ModelCredentials;
//!
//! let model = OpenAiModel::new(ModelCredentials::new("sk-...")?.with_model("gpt-5-mini"));
//! let orchestrator = ExtractionOrchestrator::new(store, model, TextFileSource::new());
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{ExtractionError, Result};
use crate::pipeline::prompts::{format_field_prompt, truncate_chars, EXTRACT_FIELDS_PROMPT};
use crate::security::ModelCredentials;
use crate::traits::model::{LanguageModel, ModelResponse};
use crate::types::{request::Schema, request::TableRow, result::CallMetadata};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-backed language model.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    credentials: ModelCredentials,
}

impl OpenAiModel {
    pub fn new(credentials: ModelCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    /// Create from `OPENAI_API_KEY` (and optional `OPENAI_MODEL`).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ExtractionError::Config("OPENAI_API_KEY not set".into()))?;
        let mut credentials = ModelCredentials::new(api_key)?;
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            credentials = credentials.with_model(model);
        }
        Ok(Self::new(credentials))
    }

    fn base_url(&self) -> &str {
        self.credentials.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn build_request(&self, user_content: String) -> ChatRequest {
        ChatRequest {
            model: self.credentials.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: EXTRACT_FIELDS_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
            // Some models reject an explicit default temperature
            temperature: (self.credentials.temperature != 1.0).then_some(self.credentials.temperature),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn extract_fields(
        &self,
        text: &str,
        label: &str,
        schema: &Schema,
        tables: &[TableRow],
    ) -> Result<ModelResponse> {
        let truncated = truncate_chars(text, self.credentials.max_chars);
        info!(label = %label, chars = truncated.chars().count(), fields = schema.len(), "Calling model");

        let request = self.build_request(format_field_prompt(label, schema, truncated, tables));
        let started = Instant::now();

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .header("Authorization", self.credentials.api_key.bearer())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Model(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Model(
                format!("OpenAI API error ({}): {}", status, error_text).into(),
            ));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Model(Box::new(e)))?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_else(|| "{}".to_string());
        debug!(content = %content, "Model raw response");

        let values = parse_object(&content)?;

        let mut metadata = CallMetadata::default()
            .with_model(self.credentials.model.clone())
            .with_duration_ms(duration_ms);
        if let Some(usage) = chat_response.usage {
            metadata.prompt_tokens = usage.prompt_tokens;
            metadata.completion_tokens = usage.completion_tokens;
            metadata.total_tokens = usage.total_tokens;
        }

        Ok(ModelResponse::new(values).with_metadata(metadata))
    }

    fn model_name(&self) -> Option<&str> {
        Some(&self.credentials.model)
    }
}

/// Parse the model's reply, which must be a JSON object.
fn parse_object(content: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(content)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ExtractionError::Model(
            format!("expected a JSON object, got {}", other).into(),
        )),
    }
}

// Request/response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}
