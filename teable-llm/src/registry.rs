//! Task-to-model registry.
//!
//! Maps an [`AiTask`] to a `provider@model` key and builds (then caches)
//! the provider that serves that key.

use crate::config::{AiConfig, AiTask, ModelKey, ProviderKind};
use crate::providers::{AnthropicClient, AnthropicTextGenerator, OpenAIClient, OpenAITextGenerator};
use crate::{TextGenerationProvider, UsageTracker};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use teable_core::{LlmError, TeableResult};

/// Registry of text generation providers keyed by model key.
pub struct ModelRegistry {
    config: AiConfig,
    providers: RwLock<HashMap<String, Arc<dyn TextGenerationProvider>>>,
    task_models: RwLock<HashMap<AiTask, String>>,
    usage: Arc<UsageTracker>,
}

impl ModelRegistry {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            providers: RwLock::new(HashMap::new()),
            task_models: RwLock::new(HashMap::new()),
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Registry that serves one provider for every task.
    pub fn single(provider: Arc<dyn TextGenerationProvider>) -> Self {
        let registry = Self::new(AiConfig::default());
        let key = format!("{}@{}", provider.provider_name(), provider.model_id());
        registry.register(key.clone(), provider);
        for task in [AiTask::Coding, AiTask::Chat, AiTask::Translation] {
            registry.set_task_model(task, key.clone());
        }
        registry
    }

    /// Register a provider under a model key.
    /// Replaces any provider previously cached for the key.
    pub fn register(&self, key: impl Into<String>, provider: Arc<dyn TextGenerationProvider>) {
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), provider);
    }

    /// Override the model key used for a task.
    pub fn set_task_model(&self, task: AiTask, key: impl Into<String>) {
        self.task_models
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task, key.into());
    }

    /// Model key serving a task, overrides first.
    pub fn model_key(&self, task: AiTask) -> Option<String> {
        let overridden = self
            .task_models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&task)
            .cloned();
        overridden.or_else(|| self.config.model_for(task).map(str::to_string))
    }

    /// Get the provider serving a task.
    ///
    /// # Returns
    /// * `Ok(Arc<dyn TextGenerationProvider>)` - Cached or freshly built provider
    /// * `Err(LlmError::ModelNotConfigured)` - No model key for the task
    /// * `Err(LlmError::UnknownModel)` - The key names no configured provider
    pub fn resolve(&self, task: AiTask) -> TeableResult<Arc<dyn TextGenerationProvider>> {
        let key = self.model_key(task).ok_or_else(|| LlmError::ModelNotConfigured {
            task: task.to_string(),
        })?;
        self.resolve_key(&key)
    }

    /// Get the provider for an explicit model key.
    pub fn resolve_key(&self, key: &str) -> TeableResult<Arc<dyn TextGenerationProvider>> {
        if let Some(provider) = self
            .providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return Ok(Arc::clone(provider));
        }

        let provider = self.build(key)?;
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        let entry = providers
            .entry(key.to_string())
            .or_insert_with(|| Arc::clone(&provider));
        Ok(Arc::clone(entry))
    }

    fn build(&self, key: &str) -> TeableResult<Arc<dyn TextGenerationProvider>> {
        let parsed: ModelKey = key.parse()?;
        let provider_config =
            self.config
                .provider(&parsed.provider)
                .ok_or_else(|| LlmError::UnknownModel {
                    key: key.to_string(),
                })?;

        tracing::debug!(
            provider = %provider_config.name,
            model = %parsed.model,
            "building text generation provider"
        );

        let usage = Arc::clone(&self.usage);
        let provider: Arc<dyn TextGenerationProvider> = match provider_config.kind {
            ProviderKind::OpenAi => {
                let mut client = OpenAIClient::new(
                    provider_config.api_key.clone(),
                    provider_config.requests_per_minute,
                );
                if let Some(base_url) = &provider_config.base_url {
                    client = client.with_base_url(base_url.clone());
                }
                Arc::new(OpenAITextGenerator::new(Arc::new(client), parsed.model, usage))
            }
            ProviderKind::Anthropic => {
                let mut client = AnthropicClient::new(
                    provider_config.api_key.clone(),
                    provider_config.requests_per_minute,
                );
                if let Some(base_url) = &provider_config.base_url {
                    client = client.with_base_url(base_url.clone());
                }
                Arc::new(AnthropicTextGenerator::new(
                    Arc::new(client),
                    parsed.model,
                    usage,
                ))
            }
        };
        Ok(provider)
    }

    /// Token usage across every provider built by this registry.
    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn has_model(&self, task: AiTask) -> bool {
        self.model_key(task).is_some()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached: Vec<String> = self
            .providers
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("ModelRegistry")
            .field("providers", &self.config.llm_providers.len())
            .field("cached", &cached)
            .field("usage", &self.usage)
            .finish()
    }
}
