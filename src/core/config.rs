//! Pipeline definitions loaded from YAML

use crate::core::{
    ChatPipeline, Comparator, ComparatorRegistry, Params, Pipeline, PipelineError,
    PromptTemplate, Shape, StructuredPipeline,
};
use crate::llm::{reserved_option, ChatClient, ClientConfig, RequestOptions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Top-level pipeline definition
///
/// ```yaml
/// name: sentiment
/// prompt:
///   system: "Answer with one word."
///   user: "Classify the sentiment of: {text}"
/// client:
///   model: gpt-4o-mini
///   max_retries: 2
/// options:
///   temperature: 0
/// output:
///   default_comparator: case_insensitive
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Display name reported in test runs
    pub name: String,

    pub prompt: PromptTemplate,

    /// Overrides applied on top of the environment client configuration
    #[serde(default)]
    pub client: ClientOverrides,

    /// Request options forwarded verbatim with every call
    #[serde(default)]
    pub options: RequestOptions,

    #[serde(default)]
    pub output: Option<OutputConfig>,
}

/// Per-pipeline client settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientOverrides {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub backoff_factor: Option<f64>,

    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

/// How the model answer is interpreted and scored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// When present the answer is decoded and validated against it
    #[serde(default)]
    pub shape: Option<Shape>,

    /// Name from the built-in comparator registry
    #[serde(default)]
    pub default_comparator: Option<String>,
}

impl PipelineConfig {
    /// Load a pipeline definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline definition {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid pipeline definition {}", path.display()))
    }

    /// Parse a pipeline definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        self.prompt
            .placeholders()
            .context("Malformed user prompt template")?;

        if let Some(factor) = self.client.backoff_factor {
            if !(factor.is_finite() && factor > 0.0) {
                anyhow::bail!("backoff_factor must be positive, got {}", factor);
            }
        }
        if let Some(timeout) = self.client.timeout_secs {
            if !(timeout > 0.0 && Duration::try_from_secs_f64(timeout).is_ok()) {
                anyhow::bail!("timeout_secs must be a positive duration, got {}", timeout);
            }
        }

        if let Some(key) = reserved_option(&self.options) {
            anyhow::bail!("Request option '{}' is set by the client and cannot be overridden", key);
        }

        if let Some(name) = self.default_comparator_name() {
            let builtin = ComparatorRegistry::builtin();
            if !builtin.contains(name) {
                anyhow::bail!(
                    "Unknown default comparator '{}' (available: {})",
                    name,
                    builtin.names().join(", ")
                );
            }
        }

        Ok(())
    }

    fn default_comparator_name(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|output| output.default_comparator.as_deref())
    }

    /// Apply this definition's overrides to a base client configuration
    pub fn client_config(&self, base: ClientConfig) -> ClientConfig {
        let overrides = &self.client;
        let mut config = base;
        if let Some(model) = &overrides.model {
            config = config.with_model(model.clone());
        }
        if let Some(base_url) = &overrides.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(max_retries) = overrides.max_retries {
            config = config.with_max_retries(max_retries);
        }
        if let Some(backoff_factor) = overrides.backoff_factor {
            config = config.with_backoff_factor(backoff_factor);
        }
        if let Some(timeout) = overrides.timeout_secs {
            config = config.with_timeout(timeout);
        }
        config
    }

    /// Build a pipeline over the HTTP client
    pub fn build(&self, base: ClientConfig) -> Result<Arc<dyn Pipeline>> {
        let client = ChatClient::new(self.client_config(base))
            .with_context(|| format!("Invalid client configuration for '{}'", self.name))?;
        self.build_with_client(client)
    }

    /// Build a pipeline over an existing client
    pub fn build_with_client(&self, client: ChatClient) -> Result<Arc<dyn Pipeline>> {
        let default_comparator = match self.default_comparator_name() {
            Some(name) => Some(
                ComparatorRegistry::builtin()
                    .get(name)
                    .with_context(|| format!("Unknown default comparator '{}'", name))?,
            ),
            None => None,
        };
        let shape = self.output.as_ref().and_then(|output| output.shape.clone());

        let pipeline: Arc<dyn Pipeline> = match shape {
            Some(shape) => {
                let mut structured = StructuredPipeline::new(client, self.prompt.clone(), shape)
                    .with_name(self.name.clone())
                    .with_options(self.options.clone());
                if let Some(comparator) = default_comparator {
                    structured = structured.with_default_comparator(comparator);
                }
                Arc::new(structured)
            }
            None => {
                let chat = ChatPipeline::new(client, self.prompt.clone())
                    .with_name(self.name.clone())
                    .with_options(self.options.clone());
                match default_comparator {
                    Some(comparator) => Arc::new(ScoredChatPipeline { chat, comparator }),
                    None => Arc::new(chat),
                }
            }
        };
        Ok(pipeline)
    }
}

/// Plain chat pipeline carrying a default comparator from its definition
struct ScoredChatPipeline {
    chat: ChatPipeline,
    comparator: Comparator,
}

#[async_trait]
impl Pipeline for ScoredChatPipeline {
    fn name(&self) -> Option<&str> {
        Some(self.chat.display_name())
    }

    async fn execute(&self, params: &Params) -> Result<Value, PipelineError> {
        self.chat.run(params).await
    }

    fn default_comparator(&self) -> Option<Comparator> {
        Some(self.comparator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_definition() {
        let yaml = r#"
name: "Echo"
prompt:
  user: "Repeat {text}"
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "Echo");
        assert_eq!(config.prompt.user, "Repeat {text}");
        assert!(config.prompt.system.is_none());
        assert!(config.options.is_empty());
        assert!(config.output.is_none());
    }

    #[test]
    fn test_full_definition() {
        let yaml = r#"
name: "Ticket triage"
prompt:
  system: "Reply with JSON."
  user: "Triage: {ticket}"
client:
  model: "gpt-4o"
  max_retries: 1
  backoff_factor: 0.1
  timeout_secs: 5
options:
  temperature: 0
  response_format:
    type: json_object
output:
  default_comparator: subset
  shape:
    type: object
    fields:
      category: { type: string }
      urgent: { type: boolean }
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.options["temperature"], json!(0));
        assert_eq!(
            config.options["response_format"],
            json!({"type": "json_object"})
        );

        let client = config.client_config(ClientConfig::new("sk-test"));
        assert_eq!(client.model, "gpt-4o");
        assert_eq!(client.max_retries, 1);
        assert_eq!(client.backoff_factor, 0.1);
        assert_eq!(client.timeout, 5.0);

        let output = config.output.unwrap();
        assert_eq!(output.default_comparator.as_deref(), Some("subset"));
        assert!(matches!(output.shape, Some(Shape::Object { .. })));
    }

    #[test]
    fn test_overrides_keep_base_values() {
        let yaml = r#"
name: "Echo"
prompt:
  user: "{text}"
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let base = ClientConfig::new("sk-test").with_model("local");
        let client = config.client_config(base.clone());
        assert_eq!(client, base);
    }

    #[test]
    fn test_rejects_empty_name() {
        let yaml = r#"
name: "  "
prompt:
  user: "{text}"
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_rejects_malformed_template() {
        let yaml = r#"
name: "Broken"
prompt:
  user: "Hello {name"
"#;
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_unknown_default_comparator() {
        let yaml = r#"
name: "Echo"
prompt:
  user: "{text}"
output:
  default_comparator: fuzzy
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("fuzzy"));
    }

    #[test]
    fn test_rejects_non_positive_backoff() {
        let yaml = r#"
name: "Echo"
prompt:
  user: "{text}"
client:
  backoff_factor: 0
"#;
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_timeout() {
        let yaml = r#"
name: "Echo"
prompt:
  user: "{text}"
client:
  timeout_secs: 1.0e20
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_rejects_options_overriding_model() {
        let yaml = r#"
name: "Echo"
prompt:
  user: "{text}"
options:
  model: "other-model"
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("'model'"));
    }
}
