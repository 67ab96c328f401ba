//! Loading test case batches from JSON files

use crate::core::Params;
use crate::testing::{ComparatorRef, TestCase};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to read test cases from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid test cases JSON: {0}")]
    Invalid(String),
}

/// One entry of a batch file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCasePayload {
    pub id: String,

    #[serde(default)]
    pub params: Params,

    /// Required, though `null` is an accepted value
    pub expected_output: Value,

    #[serde(default)]
    pub comparator: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl From<TestCasePayload> for TestCase {
    fn from(payload: TestCasePayload) -> Self {
        TestCase {
            id: payload.id,
            params: payload.params,
            expected_output: payload.expected_output,
            comparator: payload.comparator.map(ComparatorRef::Named),
            description: payload.description,
            metadata: payload.metadata,
        }
    }
}

/// Parse and validate a batch from JSON text
pub fn parse_test_cases(text: &str) -> Result<Vec<TestCase>, BatchError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| BatchError::Invalid(e.to_string()))?;
    let entries = match root {
        Value::Array(entries) => entries,
        other => {
            return Err(BatchError::Invalid(format!(
                "expected an array of test cases at the root, got {}",
                kind_of(&other)
            )))
        }
    };

    let mut cases = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let payload: TestCasePayload = serde_json::from_value(entry)
            .map_err(|e| BatchError::Invalid(format!("test case #{}: {}", index, e)))?;
        if !seen.insert(payload.id.clone()) {
            warn!("Duplicate test case id '{}' in batch", payload.id);
        }
        cases.push(TestCase::from(payload));
    }

    debug!("Loaded {} test cases", cases.len());
    Ok(cases)
}

/// Read and validate a batch file
pub fn load_test_cases<P: AsRef<Path>>(path: P) -> Result<Vec<TestCase>, BatchError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_test_cases(&text).map_err(|e| match e {
        BatchError::Invalid(reason) => {
            BatchError::Invalid(format!("{} at {}", reason, path.display()))
        }
        other => other,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON Schema describing a batch file
pub fn test_cases_json_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "TestCases",
        "description": "Ordered list of labeled test cases for a pipeline",
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Test case identifier, unique within the batch"
                },
                "params": {
                    "type": "object",
                    "description": "Named arguments passed to the pipeline",
                    "default": {}
                },
                "expected_output": {
                    "description": "Expected pipeline output"
                },
                "comparator": {
                    "type": ["string", "null"],
                    "description": "Comparator name from the runner or pipeline registry",
                    "default": null
                },
                "description": {
                    "type": ["string", "null"],
                    "description": "Short description of what the case checks",
                    "default": null
                },
                "metadata": {
                    "type": ["object", "null"],
                    "description": "Free-form metadata such as topic, language or notes",
                    "default": null
                }
            },
            "required": ["id", "expected_output"]
        }
    })
}
