//! Text-generation provider clients
//!
//! One trait, one implementation per provider. The pool core never talks
//! HTTP itself; these are the only components that do.

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::config::{LlmConfig, LlmProviderKind};
use crate::agents::domain::Turn;
use crate::agents::error::{AgentError, AgentResult, LlmResult};
use crate::config::SecretsConfig;

/// A text-generation provider
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Model identifier in use
    fn model(&self) -> &str;

    /// Produce a completion. Implementations carry a bounded HTTP timeout;
    /// callers additionally bound the whole call.
    async fn complete(&self, request: CompletionRequest) -> LlmResult<String>;
}

/// One completion request assembled by the `llm` agent variant
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction prepended to the exchange
    pub system: String,
    /// Prior turns, oldest first
    pub history: Vec<Turn>,
    /// The inbound message being answered
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Instantiate the provider named by an agent's variant config
pub fn create_provider(
    config: &LlmConfig,
    secrets: &SecretsConfig,
) -> AgentResult<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        LlmProviderKind::OpenAi => {
            let api_key = secrets
                .openai_api_key()
                .ok_or_else(|| AgentError::Config("OpenAI API key not configured".to_string()))?;
            Arc::new(OpenAiProvider::new(config, api_key))
        }
        LlmProviderKind::Anthropic => {
            let api_key = secrets.anthropic_api_key().ok_or_else(|| {
                AgentError::Config("Anthropic API key not configured".to_string())
            })?;
            Arc::new(AnthropicProvider::new(config, api_key))
        }
    };
    Ok(provider)
}
