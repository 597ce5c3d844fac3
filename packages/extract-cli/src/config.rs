use anyhow::{Context, Result};
use dotenvy::dotenv;
use field_extraction::{ExtractionConfig, ModelCredentials};
use std::env;
use std::time::Duration;

/// CLI configuration loaded from environment variables
#[derive(Clone)]
pub struct CliConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub temperature: f32,
    pub max_chars: usize,
    pub timeout: Duration,
}

impl CliConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| ModelCredentials::DEFAULT_MODEL.to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            temperature: env::var("EXTRACTION_TEMPERATURE")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()
                .context("EXTRACTION_TEMPERATURE must be a number")?,
            max_chars: env::var("EXTRACTION_MAX_CHARS")
                .unwrap_or_else(|_| "6000".to_string())
                .parse()
                .context("EXTRACTION_MAX_CHARS must be a valid number")?,
            timeout: Duration::from_secs(
                env::var("EXTRACTION_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("EXTRACTION_TIMEOUT_SECS must be a valid number")?,
            ),
        })
    }

    pub fn credentials(&self) -> Result<ModelCredentials> {
        let mut credentials = ModelCredentials::new(self.openai_api_key.clone())?
            .with_model(self.openai_model.clone())
            .with_temperature(self.temperature)
            .with_max_chars(self.max_chars);
        if let Some(url) = &self.openai_base_url {
            credentials = credentials.with_base_url(url.clone());
        }
        Ok(credentials)
    }

    pub fn extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig::new().with_model_timeout(self.timeout)
    }
}
