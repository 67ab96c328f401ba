//! Test case definitions

use crate::core::{Comparator, Params};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// How a test case names its comparator
#[derive(Clone)]
pub enum ComparatorRef {
    /// Looked up in the runner registry, then in the pipeline's
    Named(String),
    /// Used as is
    Custom(Comparator),
}

impl fmt::Debug for ComparatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparatorRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            ComparatorRef::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for ComparatorRef {
    fn from(name: &str) -> Self {
        ComparatorRef::Named(name.to_string())
    }
}

impl From<String> for ComparatorRef {
    fn from(name: String) -> Self {
        ComparatorRef::Named(name)
    }
}

impl From<Comparator> for ComparatorRef {
    fn from(comparator: Comparator) -> Self {
        ComparatorRef::Custom(comparator)
    }
}

/// A labeled input with its expected output
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Should be unique within a batch; duplicates still run
    pub id: String,

    /// Named arguments for the pipeline
    pub params: Params,

    pub expected_output: Value,

    pub comparator: Option<ComparatorRef>,

    pub description: Option<String>,

    pub metadata: Option<Map<String, Value>>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, expected_output: Value) -> Self {
        Self {
            id: id.into(),
            params: Params::new(),
            expected_output,
            comparator: None,
            description: None,
            metadata: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Refer to a comparator by name
    pub fn with_comparator_name(mut self, name: impl Into<String>) -> Self {
        self.comparator = Some(ComparatorRef::Named(name.into()));
        self
    }

    /// Supply the comparison function directly
    pub fn with_comparator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.comparator = Some(ComparatorRef::Custom(Arc::new(f)));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Comparator name, when the case refers to one symbolically
    pub fn comparator_name(&self) -> Option<&str> {
        match &self.comparator {
            Some(ComparatorRef::Named(name)) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_builder() {
        let case = TestCase::new("greeting", json!("Hello World"))
            .with_param("name", "World")
            .with_comparator_name("case_insensitive")
            .with_description("basic greeting");

        assert_eq!(case.id, "greeting");
        assert_eq!(case.params["name"], json!("World"));
        assert_eq!(case.comparator_name(), Some("case_insensitive"));
        assert_eq!(case.description.as_deref(), Some("basic greeting"));
        assert!(case.metadata.is_none());
    }

    #[test]
    fn test_custom_comparator_has_no_name() {
        let case = TestCase::new("any", json!(null)).with_comparator(|_, _| true);
        assert!(case.comparator_name().is_none());
        assert!(matches!(case.comparator, Some(ComparatorRef::Custom(_))));
        assert_eq!(format!("{:?}", case.comparator.unwrap()), "Custom(..)");
    }
}
