//! Comparators decide whether an actual output matches the expected one

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Two-argument predicate over `(actual, expected)`
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Wrap a closure into a shareable [`Comparator`]
pub fn comparator<F>(f: F) -> Comparator
where
    F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Universal default: structural equality
pub fn exact_match() -> Comparator {
    comparator(structural_eq)
}

/// Structural equality where `1` and `1.0` compare equal
pub fn structural_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                return true;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structural_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| structural_eq(x, y)))
        }
        _ => actual == expected,
    }
}

/// String form used by the text comparators
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every key of `expected` is present in `actual` with a matching value
pub fn json_subset(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(b)) => b
            .iter()
            .all(|(key, y)| a.get(key).is_some_and(|x| json_subset(x, y))),
        _ => structural_eq(actual, expected),
    }
}

/// Named comparators owned by a runner or a pipeline
#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    entries: HashMap<String, Comparator>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the comparators every runner can refer to by name
    pub fn builtin() -> Self {
        Self::new()
            .with("exact", structural_eq)
            .with("case_insensitive", |actual, expected| {
                text_of(actual).to_lowercase() == text_of(expected).to_lowercase()
            })
            .with("contains", |actual, expected| {
                text_of(actual).contains(&text_of(expected))
            })
            .with("subset", json_subset)
    }

    /// Add or replace a named comparator
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(f));
    }

    pub fn insert_shared(&mut self, name: impl Into<String>, comparator: Comparator) {
        self.entries.insert(name.into(), comparator);
    }

    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<Comparator> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
