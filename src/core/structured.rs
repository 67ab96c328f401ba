//! Pipeline that decodes the model answer and checks it against a shape

use crate::core::{
    ChatPipeline, Comparator, ComparatorRegistry, OutputError, Params, Pipeline, PipelineError,
    PromptTemplate, ResponseShape,
};
use crate::llm::{ChatClient, RequestOptions};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Chat pipeline whose result is a decoded, validated value
///
/// Besides the shape it owns the comparators the runner may pick up:
/// a registry of named ones and an optional default.
#[derive(Clone)]
pub struct StructuredPipeline<S> {
    chat: ChatPipeline,
    shape: S,
    comparators: ComparatorRegistry,
    default_comparator: Option<Comparator>,
}

impl<S: ResponseShape> StructuredPipeline<S> {
    pub fn new(client: ChatClient, prompt: PromptTemplate, shape: S) -> Self {
        Self {
            chat: ChatPipeline::new(client, prompt).with_name("StructuredChatPipeline"),
            shape,
            comparators: ComparatorRegistry::new(),
            default_comparator: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.chat = self.chat.with_name(name);
        self
    }

    pub fn with_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, PipelineError> + Send + Sync + 'static,
    {
        self.chat = self.chat.with_extractor(extractor);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.chat = self.chat.with_options(options);
        self
    }

    /// Register a comparator the test cases can refer to by name
    pub fn with_comparator<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.comparators.insert(name, f);
        self
    }

    pub fn with_comparators(mut self, comparators: ComparatorRegistry) -> Self {
        self.comparators = comparators;
        self
    }

    pub fn with_default_comparator(mut self, comparator: Comparator) -> Self {
        self.default_comparator = Some(comparator);
        self
    }

    pub fn shape(&self) -> &S {
        &self.shape
    }

    pub fn comparators(&self) -> &ComparatorRegistry {
        &self.comparators
    }

    pub fn display_name(&self) -> &str {
        self.chat.display_name()
    }

    /// Decode extracted text and conform it to the shape
    pub fn parse(&self, extracted: Value) -> Result<S::Output, PipelineError> {
        let text = match extracted {
            Value::String(text) => text,
            other => {
                return Err(OutputError::Decode(format!("expected text, got {}", other)).into())
            }
        };
        let payload: Value = serde_json::from_str(text.trim())
            .map_err(|e| OutputError::Decode(e.to_string()))?;
        Ok(self.shape.conform(payload)?)
    }

    pub fn run_blocking(&self, params: &Params) -> Result<S::Output, PipelineError> {
        let extracted = self.chat.run_blocking(params)?;
        self.parse(extracted)
    }

    pub async fn run(&self, params: &Params) -> Result<S::Output, PipelineError> {
        let extracted = self.chat.run(params).await?;
        self.parse(extracted)
    }
}

impl<S: fmt::Debug> fmt::Debug for StructuredPipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredPipeline")
            .field("chat", &self.chat)
            .field("shape", &self.shape)
            .field("comparators", &self.comparators)
            .field("has_default_comparator", &self.default_comparator.is_some())
            .finish()
    }
}

#[async_trait]
impl<S> Pipeline for StructuredPipeline<S>
where
    S: ResponseShape,
    S::Output: Serialize,
{
    fn name(&self) -> Option<&str> {
        Some(self.chat.display_name())
    }

    async fn execute(&self, params: &Params) -> Result<Value, PipelineError> {
        let output = self.run(params).await?;
        serde_json::to_value(output).map_err(|e| PipelineError::Other(e.into()))
    }

    fn default_comparator(&self) -> Option<Comparator> {
        self.default_comparator.clone()
    }

    fn named_comparator(&self, name: &str) -> Option<Comparator> {
        self.comparators.get(name)
    }
}

/// Structured pipeline over the runtime shape descriptor
pub type DynamicPipeline = StructuredPipeline<crate::core::Shape>;
