//! Error types for the chat client boundary

use std::fmt;
use thiserror::Error;

/// Closed set of failure kinds reported by a chat backend
///
/// The first four kinds are transient and eligible for retry, the rest are
/// permanent and surface after a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// The connection could not be established or was dropped
    Connection,
    /// The request did not complete within the configured timeout
    Timeout,
    /// Generic server-side failure (5xx and unclassified statuses)
    Api,
    /// The service asked us to slow down (HTTP 429)
    RateLimit,
    /// Credential rejected (HTTP 401)
    Authentication,
    /// Credential lacks access (HTTP 403)
    PermissionDenied,
    /// Request rejected as malformed (HTTP 400 and other 4xx)
    BadRequest,
    /// Model or endpoint does not exist (HTTP 404)
    NotFound,
    /// Request was well-formed but could not be processed (HTTP 422)
    Unprocessable,
    /// The service answered with a body we could not decode
    InvalidResponse,
    /// Anything else raised while talking to the service
    Internal,
}

impl ServiceErrorKind {
    /// Whether a failure of this kind may be retried
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ServiceErrorKind::Connection
                | ServiceErrorKind::Timeout
                | ServiceErrorKind::Api
                | ServiceErrorKind::RateLimit
        )
    }

    /// Classify an HTTP status code returned by the service
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ServiceErrorKind::BadRequest,
            401 => ServiceErrorKind::Authentication,
            403 => ServiceErrorKind::PermissionDenied,
            404 => ServiceErrorKind::NotFound,
            408 => ServiceErrorKind::Timeout,
            422 => ServiceErrorKind::Unprocessable,
            429 => ServiceErrorKind::RateLimit,
            400..=499 => ServiceErrorKind::BadRequest,
            _ => ServiceErrorKind::Api,
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceErrorKind::Connection => "connection error",
            ServiceErrorKind::Timeout => "request timed out",
            ServiceErrorKind::Api => "API error",
            ServiceErrorKind::RateLimit => "rate limited",
            ServiceErrorKind::Authentication => "authentication failed",
            ServiceErrorKind::PermissionDenied => "permission denied",
            ServiceErrorKind::BadRequest => "bad request",
            ServiceErrorKind::NotFound => "not found",
            ServiceErrorKind::Unprocessable => "unprocessable request",
            ServiceErrorKind::InvalidResponse => "invalid response",
            ServiceErrorKind::Internal => "internal error",
        };
        f.write_str(label)
    }
}

/// Failure raised by a chat backend, tagged with its kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Build an error from a non-success HTTP response
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: ServiceErrorKind::from_status(status),
            message: format!("HTTP {}: {}", status, body.into()),
            status: Some(status),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Timeout, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Api, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::RateLimit, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Invalid client configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("API key must not be empty")]
    MissingApiKey,

    #[error("backoff_factor must be a positive number of seconds, got {0}")]
    InvalidBackoff(f64),

    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
