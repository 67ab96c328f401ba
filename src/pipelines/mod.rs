//! Built-in pipelines and the registry the CLI resolves references against

pub mod splitter;

pub use splitter::{
    compare_orders_and_flag, ConversationSplit, ConversationSplitter, OrderContext,
    SPLITTER_PROMPT,
};

use crate::core::Pipeline;
use crate::llm::{ChatClient, ClientConfig};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Zero-argument constructor for a pipeline
pub type PipelineFactory = Arc<dyn Fn() -> Result<Arc<dyn Pipeline>> + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Instance(Arc<dyn Pipeline>),
    Factory(PipelineFactory),
}

/// Pipelines addressable by a reference name
#[derive(Clone, Default)]
pub struct PipelineRegistry {
    entries: BTreeMap<String, Entry>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in pipelines, built lazily from `config`
    pub fn builtin(config: ClientConfig) -> Self {
        let mut registry = Self::new();
        registry.register_factory("conversation_splitter", move || {
            let client = ChatClient::new(config.clone())
                .context("Failed to create client for conversation_splitter")?;
            Ok(Arc::new(ConversationSplitter::new(client)) as Arc<dyn Pipeline>)
        });
        registry
    }

    /// Register an already constructed pipeline
    pub fn register(&mut self, name: impl Into<String>, pipeline: Arc<dyn Pipeline>) {
        self.entries.insert(name.into(), Entry::Instance(pipeline));
    }

    /// Register a constructor invoked on every resolution
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Pipeline>> + Send + Sync + 'static,
    {
        self.entries
            .insert(name.into(), Entry::Factory(Arc::new(factory)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered reference names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Construct or fetch the pipeline registered under `name`
    pub fn resolve(&self, name: &str) -> Result<Option<Arc<dyn Pipeline>>> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(Entry::Instance(pipeline)) => Ok(Some(pipeline.clone())),
            Some(Entry::Factory(factory)) => factory()
                .with_context(|| format!("Failed to construct pipeline '{}'", name))
                .map(Some),
        }
    }
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("names", &self.names())
            .finish()
    }
}
