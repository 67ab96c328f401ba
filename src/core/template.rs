//! Prompt templates with `{name}` placeholders

use crate::core::Params;
use crate::llm::Message;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// `{{` and `}}` are escaped braces; `{...}` is a placeholder
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("placeholder pattern is valid"));

/// Errors raised while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Missing parameter for prompt placeholder: {0}")]
    MissingParameter(String),

    #[error("Positional placeholder '{{}}' at byte {0} is not supported, name the parameter")]
    Positional(usize),

    #[error("Single '{brace}' encountered at byte {position} in prompt template")]
    Unbalanced { brace: char, position: usize },
}

/// Container for prompt strings
///
/// Only the `user` template is rendered; the `system` prompt is sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub user: String,

    #[serde(default)]
    pub system: Option<String>,
}

enum Segment<'a> {
    Literal(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

impl PromptTemplate {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Names referenced by the user template, in order of appearance
    pub fn placeholders(&self) -> Result<Vec<String>, TemplateError> {
        let mut names = Vec::new();
        for segment in parse(&self.user)? {
            if let Segment::Placeholder(name) = segment {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Substitute every placeholder of the user template
    ///
    /// Fails on the first placeholder without a matching parameter.
    pub fn render_user(&self, params: &Params) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(self.user.len());
        for segment in parse(&self.user)? {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Brace(brace) => rendered.push(brace),
                Segment::Placeholder(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingParameter(name.to_string()))?;
                    rendered.push_str(&render_value(value));
                }
            }
        }
        Ok(rendered)
    }

    /// Build the request messages: system first (when declared), then user
    pub fn build_messages(&self, params: &Params) -> Result<Vec<Message>, TemplateError> {
        let user = self.render_user(params)?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(user));
        Ok(messages)
    }
}

/// Strings are inserted as-is, everything else in its JSON form
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        push_literal(&mut segments, template, last, whole.start())?;

        match whole.as_str() {
            "{{" => segments.push(Segment::Brace('{')),
            "}}" => segments.push(Segment::Brace('}')),
            _ => {
                let field = caps.get(1).map_or("", |m| m.as_str());
                // Format specs and conversions (`{x:>4}`, `{x!r}`) are ignored
                let name = field.split([':', '!']).next().unwrap_or("").trim();
                if name.is_empty() {
                    return Err(TemplateError::Positional(whole.start()));
                }
                segments.push(Segment::Placeholder(name));
            }
        }
        last = whole.end();
    }

    push_literal(&mut segments, template, last, template.len())?;
    Ok(segments)
}

fn push_literal<'a>(
    segments: &mut Vec<Segment<'a>>,
    template: &'a str,
    start: usize,
    end: usize,
) -> Result<(), TemplateError> {
    let text = &template[start..end];
    if let Some(offset) = text.find(['{', '}']) {
        return Err(TemplateError::Unbalanced {
            brace: text[offset..].chars().next().unwrap_or('{'),
            position: start + offset,
        });
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use serde_json::json;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_user_template() {
        let template = PromptTemplate::new("Hello {name}");
        let rendered = template.render_user(&params(json!({"name": "World"}))).unwrap();
        assert_eq!(rendered, "Hello World");
    }

    #[test]
    fn test_missing_parameter_names_placeholder() {
        let template = PromptTemplate::new("Hello {name}, you are {age}");
        let error = template
            .render_user(&params(json!({"age": 30})))
            .unwrap_err();
        assert_eq!(error, TemplateError::MissingParameter("name".to_string()));
        assert_eq!(error.to_string(), "Missing parameter for prompt placeholder: name");
    }

    #[test]
    fn test_non_string_values_render_as_json() {
        let template = PromptTemplate::new("n={n} ok={ok} tags={tags}");
        let rendered = template
            .render_user(&params(json!({"n": 3, "ok": true, "tags": ["a", "b"]})))
            .unwrap();
        assert_eq!(rendered, r#"n=3 ok=true tags=["a","b"]"#);
    }

    #[test]
    fn test_escaped_braces() {
        let template = PromptTemplate::new("Return {{\"id\": {id}}}");
        let rendered = template.render_user(&params(json!({"id": 7}))).unwrap();
        assert_eq!(rendered, "Return {\"id\": 7}");
    }

    #[test]
    fn test_unbalanced_brace_is_rejected() {
        let template = PromptTemplate::new("oops } here");
        assert_eq!(
            template.render_user(&Params::new()),
            Err(TemplateError::Unbalanced { brace: '}', position: 5 })
        );
    }

    #[test]
    fn test_positional_placeholder_is_rejected() {
        let template = PromptTemplate::new("value: {}");
        assert_eq!(
            template.render_user(&Params::new()),
            Err(TemplateError::Positional(7))
        );
    }

    #[test]
    fn test_placeholders_are_listed_once() {
        let template = PromptTemplate::new("{a} {b} {a} {c:>3}");
        assert_eq!(template.placeholders().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_system_message_comes_first() {
        let template = PromptTemplate::new("{q}").with_system("You are terse.");
        let messages = template.build_messages(&params(json!({"q": "why?"}))).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are terse.");
        assert_eq!(messages[1], Message::user("why?"));
    }

    #[test]
    fn test_empty_system_prompt_is_skipped() {
        let template = PromptTemplate::new("hi").with_system("");
        let messages = template.build_messages(&Params::new()).unwrap();
        assert_eq!(messages, vec![Message::user("hi")]);
    }
}
