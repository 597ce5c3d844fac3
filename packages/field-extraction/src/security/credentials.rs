//! Model credentials. The key lives in a `secrecy` box and never reaches logs.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

use crate::error::{ExtractionError, Result};

/// Provider API key. Only `bearer` ever reveals it.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    fn parse(raw: String) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ExtractionError::Config("API key is empty".into()));
        }
        Ok(Self(SecretBox::new(trimmed.into())))
    }

    /// `Authorization` header value for the outgoing request.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self(SecretBox::new(self.0.expose_secret().into()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Settings for a hosted language model.
#[derive(Clone)]
pub struct ModelCredentials {
    pub api_key: ApiKey,

    /// Model identifier (default: gpt-5-mini)
    pub model: String,

    /// API base URL override
    pub base_url: Option<String>,

    /// Sampling temperature. `1.0` is the provider default and is not sent.
    pub temperature: f32,

    /// Document text beyond this many chars is dropped before the call.
    pub max_chars: usize,
}

impl ModelCredentials {
    pub const DEFAULT_MODEL: &'static str = "gpt-5-mini";

    /// Create credentials, rejecting a blank key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: ApiKey::parse(api_key.into())?,
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: None,
            temperature: 1.0,
            max_chars: 6000,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the temperature, clamped to the provider's `0.0..=2.0` range.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

impl fmt::Debug for ModelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCredentials")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_only_revealed_as_bearer() {
        let creds = ModelCredentials::new("  sk-super-secret-key ").unwrap();
        assert_eq!(format!("{:?}", creds.api_key), "ApiKey(***)");
        assert_eq!(creds.api_key.bearer(), "Bearer sk-super-secret-key");
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let creds = ModelCredentials::new("sk-secret").unwrap().with_model("gpt-4o");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("gpt-4o"));
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            ModelCredentials::new("   "),
            Err(ExtractionError::Config(_))
        ));
    }

    #[test]
    fn test_temperature_clamped() {
        let creds = ModelCredentials::new("k").unwrap().with_temperature(3.5);
        assert_eq!(creds.temperature, 2.0);
    }
}
