//! Shared test utilities: a scripted chat backend and response builders

#![allow(dead_code)]

use async_trait::async_trait;
use promptcheck::llm::{
    ChatBackend, ChatClient, ChatRequest, ClientConfig, ServiceError, ServiceErrorKind,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A chat-completions response whose first choice carries `content`
pub fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }
        ]
    })
}

/// Backend that replays a fixed script of outcomes, one per attempt
///
/// Once the script runs out, every further attempt returns `fallback`
/// (or an internal error when there is none).
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Value, ServiceError>>>,
    fallback: Option<ServiceError>,
    requests: Mutex<Vec<ChatRequest>>,
    attempts: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<Value, ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the given message content
    pub fn replying(contents: &[&str]) -> Self {
        Self::new(contents.iter().map(|c| Ok(completion(c))).collect())
    }

    /// Fail every attempt with the same error
    pub fn failing(error: ServiceError) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.fallback = Some(error);
        backend
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Clock readings taken at every attempt
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempts.lock().unwrap().clone()
    }

    fn next(&self, request: &ChatRequest) -> Result<Value, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.attempts
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Err(self.fallback.clone().unwrap_or_else(|| {
                ServiceError::new(ServiceErrorKind::Internal, "script exhausted")
            })),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn complete(&self, request: &ChatRequest) -> Result<Value, ServiceError> {
        self.next(request)
    }

    async fn complete_async(&self, request: &ChatRequest) -> Result<Value, ServiceError> {
        self.next(request)
    }
}

/// Test configuration with a tiny backoff
pub fn config(max_retries: u32) -> ClientConfig {
    ClientConfig::new("sk-test")
        .with_max_retries(max_retries)
        .with_backoff_factor(0.01)
}

/// Client over a scripted backend; the backend is returned for inspection
pub fn scripted_client(
    config: ClientConfig,
    backend: ScriptedBackend,
) -> (ChatClient, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let client = ChatClient::with_backend(config, backend.clone()).unwrap();
    (client, backend)
}
