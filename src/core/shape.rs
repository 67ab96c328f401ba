//! Declared shapes that structured output must satisfy

use crate::core::OutputError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Validates a decoded value and converts it into the pipeline output
pub trait ResponseShape: Send + Sync {
    type Output;

    fn conform(&self, value: Value) -> Result<Self::Output, OutputError>;
}

/// Shape given by a Rust type through its `Deserialize` impl
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> Typed<T> {
    pub fn new() -> Self {
        Typed(PhantomData)
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> ResponseShape for Typed<T> {
    type Output = T;

    fn conform(&self, value: Value) -> Result<T, OutputError> {
        serde_json::from_value(value).map_err(|e| OutputError::Schema(e.to_string()))
    }
}

fn any_shape() -> Box<Shape> {
    Box::new(Shape::Any)
}

/// Runtime shape descriptor, loadable from pipeline definition files
///
/// ```yaml
/// type: object
/// fields:
///   category: { type: string }
///   tags: { type: array, items: { type: string } }
///   note: { type: string }
/// optional: [note]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Array {
        #[serde(default = "any_shape")]
        items: Box<Shape>,
    },
    Object {
        #[serde(default)]
        fields: BTreeMap<String, Shape>,
        /// Fields that may be absent or null
        #[serde(default)]
        optional: Vec<String>,
    },
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn located(path: &str) -> String {
    if path.is_empty() {
        "value".to_string()
    } else {
        path.to_string()
    }
}

impl Shape {
    /// Check `value` against the shape, naming the first offending path
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        self.validate_at(value, "")
    }

    fn validate_at(&self, value: &Value, path: &str) -> Result<(), String> {
        let expected = match self {
            Shape::Any => return Ok(()),
            Shape::String if value.is_string() => return Ok(()),
            Shape::Number if value.is_number() => return Ok(()),
            Shape::Integer if value.is_i64() || value.is_u64() => return Ok(()),
            Shape::Boolean if value.is_boolean() => return Ok(()),
            Shape::Array { items } => {
                let Value::Array(elements) = value else {
                    return Err(mismatch(path, "array", value));
                };
                for (index, element) in elements.iter().enumerate() {
                    items.validate_at(element, &format!("{}[{}]", path, index))?;
                }
                return Ok(());
            }
            Shape::Object { fields, optional } => {
                let Value::Object(map) = value else {
                    return Err(mismatch(path, "object", value));
                };
                for (name, shape) in fields {
                    let field_path = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{}.{}", path, name)
                    };
                    match map.get(name) {
                        None | Some(Value::Null) if optional.contains(name) => {}
                        None => return Err(format!("{}: field is required", field_path)),
                        Some(field) => shape.validate_at(field, &field_path)?,
                    }
                }
                return Ok(());
            }
            Shape::String => "string",
            Shape::Number => "number",
            Shape::Integer => "integer",
            Shape::Boolean => "boolean",
        };
        Err(mismatch(path, expected, value))
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> String {
    format!("{}: expected {}, got {}", located(path), expected, type_name(value))
}

impl ResponseShape for Shape {
    type Output = Value;

    fn conform(&self, value: Value) -> Result<Value, OutputError> {
        self.validate(&value).map_err(OutputError::Schema)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_shape() -> Shape {
        serde_yaml::from_str(
            r#"
type: object
fields:
  category: { type: string }
  priority: { type: integer }
  tags:
    type: array
    items: { type: string }
  note: { type: string }
optional: [note]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_shape_from_yaml() {
        let shape = order_shape();
        match &shape {
            Shape::Object { fields, optional } => {
                assert_eq!(fields.len(), 4);
                assert_eq!(fields["tags"], Shape::Array { items: Box::new(Shape::String) });
                assert_eq!(optional, &vec!["note".to_string()]);
            }
            other => panic!("Expected object shape, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_value_passes() {
        let shape = order_shape();
        let value = json!({"category": "refund", "priority": 2, "tags": ["a"], "extra": true});
        assert!(shape.validate(&value).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let shape = order_shape();
        let error = shape
            .validate(&json!({"category": "refund", "tags": []}))
            .unwrap_err();
        assert_eq!(error, "priority: field is required");
    }

    #[test]
    fn test_wrong_nested_type_names_path() {
        let shape = order_shape();
        let error = shape
            .validate(&json!({"category": "refund", "priority": 1, "tags": ["ok", 3]}))
            .unwrap_err();
        assert_eq!(error, "tags[1]: expected string, got integer");
    }

    #[test]
    fn test_integer_rejects_float() {
        assert!(Shape::Integer.validate(&json!(2.5)).is_err());
        assert!(Shape::Number.validate(&json!(2)).is_ok());
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        name: String,
    }

    #[test]
    fn test_typed_shape_reports_schema_error() {
        let shape = Typed::<Greeting>::new();
        assert_eq!(
            shape.conform(json!({"name": "World"})).unwrap(),
            Greeting { name: "World".to_string() }
        );
        assert!(matches!(
            shape.conform(json!({"unexpected": "field"})),
            Err(OutputError::Schema(_))
        ));
    }
}
