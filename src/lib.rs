//! promptcheck - run labeled test cases against LLM prompt pipelines

pub mod cli;
pub mod core;
pub mod llm;
pub mod persistence;
pub mod pipelines;
pub mod testing;

// Re-export commonly used types
pub use crate::core::{
    ChatPipeline, Comparator, ComparatorRegistry, Params, Pipeline, PipelineConfig, PipelineError,
    PromptTemplate, Shape, StructuredPipeline, Typed,
};
pub use llm::{ChatBackend, ChatClient, ClientConfig, ServiceError, ServiceErrorKind};
pub use pipelines::PipelineRegistry;
pub use testing::{load_test_cases, TestCase, TestResult, TestRun, TestRunner};
