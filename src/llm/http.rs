//! HTTP chat-completions backend

use crate::llm::{ChatBackend, ChatRequest, ClientConfig, ConfigError, ServiceError, ServiceErrorKind};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backend posting requests to an OpenAI-compatible `/chat/completions` endpoint
pub struct HttpBackend {
    endpoint: String,
    auth_header: String,
    timeout: Duration,
    client: reqwest::Client,
    /// Built on first blocking call so async-only users never spin up its runtime
    blocking: OnceCell<reqwest::blocking::Client>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let timeout = config.timeout_duration();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url),
            auth_header: format!("Bearer {}", config.api_key),
            timeout,
            client,
            blocking: OnceCell::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client, ServiceError> {
        self.blocking.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| {
                    ServiceError::new(
                        ServiceErrorKind::Internal,
                        format!("Failed to build blocking HTTP client: {}", e),
                    )
                })
        })
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Map a transport failure onto the closed error taxonomy
fn classify_transport(error: &reqwest::Error) -> ServiceErrorKind {
    if error.is_timeout() {
        ServiceErrorKind::Timeout
    } else if error.is_connect() || error.is_request() || error.is_body() {
        ServiceErrorKind::Connection
    } else if error.is_decode() {
        ServiceErrorKind::InvalidResponse
    } else {
        ServiceErrorKind::Internal
    }
}

fn transport_error(error: reqwest::Error) -> ServiceError {
    ServiceError::new(classify_transport(&error), format!("Request failed: {}", error))
}

/// A response body cut off while streaming is a dropped connection
fn body_error(error: reqwest::Error) -> ServiceError {
    let kind = if error.is_timeout() {
        ServiceErrorKind::Timeout
    } else {
        ServiceErrorKind::Connection
    };
    ServiceError::new(kind, format!("Failed to read response body: {}", error))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ServiceError {
    warn!("Chat endpoint returned {}: {}", status, body.trim());
    ServiceError::from_status(status.as_u16(), body.trim())
}

fn decode_body(body: &str) -> Result<Value, ServiceError> {
    serde_json::from_str(body).map_err(|e| {
        ServiceError::new(
            ServiceErrorKind::InvalidResponse,
            format!("Failed to parse response: {}", e),
        )
    })
}

#[async_trait]
impl ChatBackend for HttpBackend {
    fn complete(&self, request: &ChatRequest) -> Result<Value, ServiceError> {
        debug!("POST {} (blocking)", self.endpoint);
        let response = self
            .blocking_client()?
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .json(request)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().map_err(body_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        debug!("Chat endpoint returned {} bytes", body.len());
        decode_body(&body)
    }

    async fn complete_async(&self, request: &ChatRequest) -> Result<Value, ServiceError> {
        debug!("POST {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(body_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        debug!("Chat endpoint returned {} bytes", body.len());
        decode_body(&body)
    }
}
