//! AI provider and task-to-model configuration.
//!
//! Model keys take the form `provider@model`, where `provider` is the
//! `name` of an entry in `llm_providers`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use teable_core::{ConfigError, TeableResult};

// ============================================================================
// TASKS
// ============================================================================

/// Categories of AI work, each mapped to its own model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AiTask {
    /// Cell generation and prompt-driven fills.
    Coding,
    /// Free chat and streaming completions.
    Chat,
    Translation,
}

impl AiTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::Chat => "chat",
            Self::Translation => "translation",
        }
    }
}

impl fmt::Display for AiTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PROVIDERS
// ============================================================================

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    /// OpenAI chat completions, or any compatible endpoint.
    OpenAi,
    Anthropic,
}

/// One configured LLM provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmProviderConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub api_key: String,
    /// Models offered by this provider.
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_requests_per_minute() -> u32 {
    60
}

impl fmt::Debug for LlmProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("models", &self.models)
            .finish()
    }
}

// ============================================================================
// MODEL KEYS
// ============================================================================

/// Parsed `provider@model` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub provider: String,
    pub model: String,
}

impl FromStr for ModelKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider: provider.to_string(),
                model: model.to_string(),
            }),
            _ => Err(ConfigError::InvalidValue {
                field: "model_key".to_string(),
                value: s.to_string(),
                reason: "expected provider@model".to_string(),
            }),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.provider, self.model)
    }
}

// ============================================================================
// AI CONFIG
// ============================================================================

/// Provider list plus the model key chosen for each task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub llm_providers: Vec<LlmProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_model: Option<String>,
}

impl AiConfig {
    /// Model key configured for a task.
    ///
    /// Chat and translation fall back to the coding model when unset.
    pub fn model_for(&self, task: AiTask) -> Option<&str> {
        let specific = match task {
            AiTask::Coding => None,
            AiTask::Chat => self.chat_model.as_deref(),
            AiTask::Translation => self.translation_model.as_deref(),
        };
        specific.or(self.coding_model.as_deref())
    }

    pub fn provider(&self, name: &str) -> Option<&LlmProviderConfig> {
        self.llm_providers.iter().find(|p| p.name == name)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> TeableResult<Self> {
        toml::from_str(source).map_err(|e| {
            ConfigError::InvalidValue {
                field: "ai_config".to_string(),
                value: "<toml>".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Load configuration from the environment.
    ///
    /// Environment variables:
    /// - `TEABLE_AI_CONFIG`: path to a TOML file; takes precedence
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `TEABLE_AI_OPENAI_MODEL` (default: gpt-4o-mini)
    /// - `ANTHROPIC_API_KEY`, `TEABLE_AI_ANTHROPIC_MODEL` (default: claude-3-5-haiku-latest)
    ///
    /// Without a file the first provider with a key becomes the coding model.
    pub fn from_env() -> TeableResult<Self> {
        if let Ok(path) = std::env::var("TEABLE_AI_CONFIG") {
            let source = std::fs::read_to_string(&path).map_err(|e| ConfigError::InvalidValue {
                field: "TEABLE_AI_CONFIG".to_string(),
                value: path.clone(),
                reason: e.to_string(),
            })?;
            return Self::from_toml_str(&source);
        }

        let mut config = Self::default();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            let model = std::env::var("TEABLE_AI_OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string());
            config.llm_providers.push(LlmProviderConfig {
                name: "openai".to_string(),
                kind: ProviderKind::OpenAi,
                base_url: std::env::var("OPENAI_BASE_URL").ok(),
                api_key,
                models: vec![model.clone()],
                requests_per_minute: default_requests_per_minute(),
            });
            config.coding_model.get_or_insert(format!("openai@{model}"));
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            let model = std::env::var("TEABLE_AI_ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string());
            config.llm_providers.push(LlmProviderConfig {
                name: "anthropic".to_string(),
                kind: ProviderKind::Anthropic,
                base_url: None,
                api_key,
                models: vec![model.clone()],
                requests_per_minute: 50,
            });
            config.coding_model.get_or_insert(format!("anthropic@{model}"));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
codingModel = "openai@gpt-4o-mini"
chatModel = "claude@claude-3-5-haiku-latest"

[[llmProviders]]
name = "openai"
type = "openAi"
apiKey = "sk-test"
models = ["gpt-4o-mini"]

[[llmProviders]]
name = "claude"
type = "anthropic"
apiKey = "ak-test"
requestsPerMinute = 10
"#;

    #[test]
    fn test_parse_toml() {
        let config = AiConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.llm_providers.len(), 2);
        assert_eq!(config.provider("claude").unwrap().requests_per_minute, 10);
        assert_eq!(config.provider("openai").unwrap().requests_per_minute, 60);
        assert_eq!(config.model_for(AiTask::Coding), Some("openai@gpt-4o-mini"));
        assert_eq!(
            config.model_for(AiTask::Chat),
            Some("claude@claude-3-5-haiku-latest")
        );
        assert_eq!(config.model_for(AiTask::Translation), Some("openai@gpt-4o-mini"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AiConfig::from_toml_str("llmProviders = 3").unwrap_err();
        assert!(err.to_string().contains("ai_config"));
    }

    #[test]
    fn test_model_key_parse() {
        let key: ModelKey = "openai@gpt-4o".parse().unwrap();
        assert_eq!(key.provider, "openai");
        assert_eq!(key.model, "gpt-4o");
        assert_eq!(key.to_string(), "openai@gpt-4o");

        assert!("gpt-4o".parse::<ModelKey>().is_err());
        assert!("@gpt-4o".parse::<ModelKey>().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AiConfig::from_toml_str(SAMPLE).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }
}
