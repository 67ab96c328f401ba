//! Chat client for the remote text-generation service

pub mod client;
pub mod error;
pub mod http;
pub mod message;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;

pub use client::{ChatClient, ClientConfig};
pub use error::{ConfigError, ServiceError, ServiceErrorKind};
pub use http::HttpBackend;
pub use message::{reserved_option, ChatRequest, Message, RequestOptions, Role, RESERVED_OPTIONS};
pub use retry::RetryPolicy;

/// The remote boundary: one request in, one raw response out
///
/// Implementations perform a single attempt and tag failures with a
/// [`ServiceErrorKind`]; retrying is the client's job.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Perform the request on the calling thread
    fn complete(&self, request: &ChatRequest) -> Result<Value, ServiceError>;

    /// Perform the request without blocking the executor
    async fn complete_async(&self, request: &ChatRequest) -> Result<Value, ServiceError>;
}
