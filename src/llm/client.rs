//! Chat client configuration and the retrying client

use crate::llm::{
    reserved_option, ChatBackend, ChatRequest, ConfigError, HttpBackend, Message,
    RequestOptions, RetryPolicy, ServiceError, ServiceErrorKind,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for the chat client
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    /// Credential sent as a bearer token
    pub api_key: String,

    /// Alternate service endpoint; the public API is used when unset
    pub base_url: Option<String>,

    /// Model identifier forwarded with every request
    pub model: String,

    /// Number of retries after the first attempt
    pub max_retries: u32,

    /// Base backoff delay in seconds
    pub backoff_factor: f64,

    /// Per-request timeout in seconds
    pub timeout: f64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            max_retries: 3,
            backoff_factor: 0.5,
            timeout: 30.0,
        }
    }

    /// Read configuration from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnv("OPENAI_API_KEY"))?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = Some(base_url);
            }
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(retries) = std::env::var("OPENAI_MAX_RETRIES") {
            config.max_retries = retries.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "OPENAI_MAX_RETRIES",
                value: retries.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the invariants a client relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 0.0) {
            return Err(ConfigError::InvalidBackoff(self.backoff_factor));
        }
        if !(self.timeout > 0.0 && Duration::try_from_secs_f64(self.timeout).is_ok()) {
            return Err(ConfigError::InvalidTimeout(self.timeout));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_factor)
    }

    /// Timeout as a `Duration`, saturating for values `validate` would reject
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::MAX)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("backoff_factor", &self.backoff_factor)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Retrying chat client
///
/// Holds only its immutable configuration and a shared backend, so clones are
/// cheap and one instance can serve many pipelines concurrently.
#[derive(Clone)]
pub struct ChatClient {
    config: Arc<ClientConfig>,
    backend: Arc<dyn ChatBackend>,
}

impl ChatClient {
    /// Create a client talking to the HTTP chat-completions endpoint
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = HttpBackend::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
        })
    }

    /// Create a client over any backend implementation
    pub fn with_backend(
        config: ClientConfig,
        backend: Arc<dyn ChatBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            backend,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<ChatRequest, ServiceError> {
        if let Some(key) = reserved_option(options) {
            return Err(ServiceError::new(
                ServiceErrorKind::BadRequest,
                format!("request option '{}' would override the request itself", key),
            ));
        }
        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            options: options.clone(),
        })
    }

    /// Send a chat request, blocking the calling thread through retries
    pub fn chat(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, ServiceError> {
        let request = self.request(messages, options)?;
        debug!(
            "Sending chat request to model {} with {} messages",
            request.model,
            request.messages.len()
        );
        self.config
            .retry_policy()
            .run_blocking(|| self.backend.complete(&request))
    }

    /// Send a chat request, suspending the task between retries
    pub async fn chat_async(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, ServiceError> {
        let request = self.request(messages, options)?;
        debug!(
            "Sending async chat request to model {} with {} messages",
            request.model,
            request.messages.len()
        );
        let backend = &self.backend;
        let request = &request;
        self.config
            .retry_policy()
            .run_async(move || backend.complete_async(request))
            .await
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new("sk-test")
            .with_base_url("http://localhost:8080/v1")
            .with_model("local-model")
            .with_max_retries(5)
            .with_backoff_factor(0.25)
            .with_timeout(12.0);

        assert_eq!(config.base_url, Some("http://localhost:8080/v1".to_string()));
        assert_eq!(config.model, "local-model");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_policy(), RetryPolicy::new(5, 0.25));
        assert_eq!(config.timeout_duration(), Duration::from_secs(12));
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::new("sk-test");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_factor, 0.5);
        assert_eq!(config.timeout, 30.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_validation() {
        assert_eq!(
            ClientConfig::new("  ").validate(),
            Err(ConfigError::MissingApiKey)
        );
        assert_eq!(
            ClientConfig::new("sk").with_backoff_factor(0.0).validate(),
            Err(ConfigError::InvalidBackoff(0.0))
        );
        assert_eq!(
            ClientConfig::new("sk").with_timeout(-1.0).validate(),
            Err(ConfigError::InvalidTimeout(-1.0))
        );
    }

    #[test]
    fn test_timeout_beyond_duration_range_is_rejected() {
        let config = ClientConfig::new("sk").with_timeout(1e20);
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout(1e20)));
        assert!(matches!(
            ChatClient::new(config),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(ClientConfig::new("sk").with_timeout(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", ClientConfig::new("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("redacted"));
    }
}
