//! Chat message and request types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extra request options forwarded to the service untouched
pub type RequestOptions = Map<String, Value>;

/// Body keys owned by [`ChatRequest`] that options must not carry
pub const RESERVED_OPTIONS: [&str; 2] = ["model", "messages"];

/// First option key that would collide with a typed request field
pub fn reserved_option(options: &RequestOptions) -> Option<&'static str> {
    RESERVED_OPTIONS
        .into_iter()
        .find(|key| options.contains_key(*key))
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single `{role, content}` entry of the request payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One logical chat-completion request
///
/// Options are flattened into the body next to `model` and `messages`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub options: RequestOptions,
}
