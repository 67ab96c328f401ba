//! Core pipeline model
//!
//! Prompt templates, the pipeline abstraction with its chat and structured
//! variants, declared output shapes and the comparators used to score results.

pub mod comparator;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod shape;
pub mod structured;
pub mod template;

pub use comparator::*;
pub use config::PipelineConfig;
pub use error::{OutputError, PipelineError};
pub use pipeline::*;
pub use shape::{ResponseShape, Shape, Typed};
pub use structured::{DynamicPipeline, StructuredPipeline};
pub use template::{PromptTemplate, TemplateError};
