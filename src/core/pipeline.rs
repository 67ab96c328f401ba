//! Pipeline abstraction and the plain chat pipeline

use crate::core::{Comparator, PipelineError, PromptTemplate};
use crate::llm::{ChatClient, RequestOptions};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Named arguments passed to a pipeline run
pub type Params = Map<String, Value>;

/// Turns a raw service response into the pipeline result
pub type Extractor = Arc<dyn Fn(&Value) -> Result<Value, PipelineError> + Send + Sync>;

/// Anything the test runner can execute
///
/// Comparator capabilities are explicit: a pipeline may offer a default
/// comparator and a set of named ones; both are absent unless overridden.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Display name; the runner falls back to the type name when `None`
    fn name(&self) -> Option<&str> {
        None
    }

    /// Concrete type name, used when no display name is set
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Run the pipeline with named parameters
    async fn execute(&self, params: &Params) -> Result<Value, PipelineError>;

    /// Comparator to use when neither the case nor the runner chose one
    fn default_comparator(&self) -> Option<Comparator> {
        None
    }

    /// Look up a comparator by symbolic name
    fn named_comparator(&self, _name: &str) -> Option<Comparator> {
        None
    }
}

#[async_trait]
impl<P: Pipeline + ?Sized> Pipeline for Arc<P> {
    fn name(&self) -> Option<&str> {
        (**self).name()
    }

    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    async fn execute(&self, params: &Params) -> Result<Value, PipelineError> {
        (**self).execute(params).await
    }

    fn default_comparator(&self) -> Option<Comparator> {
        (**self).default_comparator()
    }

    fn named_comparator(&self, name: &str) -> Option<Comparator> {
        (**self).named_comparator(name)
    }
}

/// Default extractor: the first choice's message content
pub fn extract_message_content(response: &Value) -> Result<Value, PipelineError> {
    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| PipelineError::extraction("response has no choices"))?;

    match choice.pointer("/message/content") {
        Some(Value::String(content)) => Ok(Value::String(content.clone())),
        Some(Value::Null) => Ok(Value::Null),
        None => Err(PipelineError::extraction(
            "first choice has no message content",
        )),
        Some(other) => Err(PipelineError::extraction(format!(
            "message content is not text: {}",
            other
        ))),
    }
}

/// Pipeline that renders a prompt, calls the client and extracts a result
#[derive(Clone)]
pub struct ChatPipeline {
    client: ChatClient,
    prompt: PromptTemplate,
    name: String,
    extractor: Extractor,
    options: RequestOptions,
}

impl ChatPipeline {
    pub fn new(client: ChatClient, prompt: PromptTemplate) -> Self {
        Self {
            client,
            prompt,
            name: "ChatPipeline".to_string(),
            extractor: Arc::new(extract_message_content),
            options: RequestOptions::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the extraction step, leaving rendering and the call untouched
    pub fn with_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, PipelineError> + Send + Sync + 'static,
    {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Extra request options sent with every call (temperature, response_format, ...)
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// Run on the calling thread; retries block it
    pub fn run_blocking(&self, params: &Params) -> Result<Value, PipelineError> {
        let messages = self.prompt.build_messages(params)?;
        debug!("Pipeline {} sending {} messages", self.name, messages.len());
        let response = self.client.chat(&messages, &self.options)?;
        (self.extractor)(&response)
    }

    /// Run as a task; retries suspend instead of blocking
    pub async fn run(&self, params: &Params) -> Result<Value, PipelineError> {
        let messages = self.prompt.build_messages(params)?;
        debug!("Pipeline {} sending {} messages", self.name, messages.len());
        let response = self.client.chat_async(&messages, &self.options).await?;
        (self.extractor)(&response)
    }
}

impl fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("name", &self.name)
            .field("prompt", &self.prompt)
            .field("client", &self.client)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Pipeline for ChatPipeline {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    async fn execute(&self, params: &Params) -> Result<Value, PipelineError> {
        self.run(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_first_choice_content() {
        let response = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ]
        });
        assert_eq!(extract_message_content(&response).unwrap(), json!("first"));
    }

    #[test]
    fn test_extract_fails_without_choices() {
        for response in [json!({}), json!({"choices": []}), json!({"choices": "nope"})] {
            let error = extract_message_content(&response).unwrap_err();
            assert!(matches!(error, PipelineError::Extraction(_)), "{:?}", error);
        }
    }

    #[test]
    fn test_extract_null_content_is_null_output() {
        let response = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(extract_message_content(&response).unwrap(), Value::Null);
    }

    #[test]
    fn test_extract_fails_without_content_key() {
        let response = json!({"choices": [{"message": {"role": "assistant"}}]});
        let error = extract_message_content(&response).unwrap_err();
        assert!(error.to_string().contains("no message content"));
    }
}
