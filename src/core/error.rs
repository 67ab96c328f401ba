//! Pipeline error types

use crate::core::TemplateError;
use crate::llm::ServiceError;
use thiserror::Error;

/// The service answered, but not with a usable structured value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("Model response is not valid JSON: {0}")]
    Decode(String),

    #[error("Model response does not match the expected schema: {0}")]
    Schema(String),
}

/// Single failure signal of a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Unable to extract message content from response: {0}")]
    Extraction(String),

    #[error(transparent)]
    Output(#[from] OutputError),

    /// Failures raised by custom pipelines and extractors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn extraction(reason: impl Into<String>) -> Self {
        PipelineError::Extraction(reason.into())
    }

    /// Whether the failure is an unusable answer rather than a missing one
    pub fn is_output_error(&self) -> bool {
        matches!(self, PipelineError::Output(_))
    }
}
