//! LLM-backed agent variant

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use super::ResponseAgent;
use crate::agents::config::{AgentKind, LlmConfig};
use crate::agents::domain::{Conversation, Turn};
use crate::agents::error::AgentResult;
use crate::agents::llm::{CompletionRequest, LlmProvider};

/// Assembles recent history plus a system instruction into a provider
/// request. Provider failures are recovered locally: the message is
/// silently dropped and the conversation stays unmodified.
pub struct LlmAgent {
    agent_id: i64,
    config: LlmConfig,
    provider: Arc<dyn LlmProvider>,
    max_history: usize,
}

impl LlmAgent {
    pub fn new(
        agent_id: i64,
        config: LlmConfig,
        provider: Arc<dyn LlmProvider>,
        max_history: usize,
    ) -> Self {
        Self {
            agent_id,
            config,
            provider,
            max_history,
        }
    }
}

#[async_trait]
impl ResponseAgent for LlmAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Llm
    }

    async fn generate(
        &self,
        text: &str,
        conversation: &mut Conversation,
    ) -> AgentResult<Option<String>> {
        let request = CompletionRequest {
            system: self.config.system_prompt.clone(),
            history: conversation.last_n(self.max_history).cloned().collect(),
            user: text.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let bound = Duration::from_secs(self.config.request_timeout_seconds);
        match timeout(bound, self.provider.complete(request)).await {
            Ok(Ok(reply)) => {
                conversation.push(Turn::user(text));
                conversation.push(Turn::assistant(reply.clone()));
                Ok(Some(reply))
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    agent_id = self.agent_id,
                    provider = self.provider.name(),
                    model = self.provider.model(),
                    error = %e,
                    "provider call failed, dropping reply"
                );
                Ok(None)
            }
            Err(_) => {
                tracing::warn!(
                    agent_id = self.agent_id,
                    provider = self.provider.name(),
                    "provider call exceeded {}s bound, dropping reply",
                    self.config.request_timeout_seconds
                );
                Ok(None)
            }
        }
    }
}
