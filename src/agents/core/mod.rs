//! Response-agent variants
//!
//! A response agent turns one admitted message plus its conversation
//! memory into at most one reply. Variants are a closed set: adding one
//! means adding a match arm here, nothing in the router or supervisor
//! changes.

mod echo;
mod llm;

pub use echo::EchoAgent;
pub use llm::LlmAgent;

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::config::{AgentConfig, AgentKind, EchoConfig, LlmConfig};
use crate::agents::domain::Conversation;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::create_provider;
use crate::config::SecretsConfig;

/// Per-connection decision logic.
///
/// `generate` must never wedge the connection supervisor: any external
/// call is bounded by a timeout, and provider failures surface as
/// `Ok(None)` rather than an error.
#[async_trait]
pub trait ResponseAgent: Send + Sync {
    /// Variant tag, for logging
    fn kind(&self) -> AgentKind;

    /// Produce a reply for an admitted message, or decline with `None`.
    /// On success the implementation appends the exchange to
    /// `conversation`; on failure the conversation is left unmodified.
    async fn generate(
        &self,
        text: &str,
        conversation: &mut Conversation,
    ) -> AgentResult<Option<String>>;
}

/// Build the response agent an `AgentConfig` asks for.
///
/// A malformed variant blob or missing provider credential is a
/// `Config` error; the reconciler skips the agent and continues.
pub fn create_agent(
    config: &AgentConfig,
    secrets: &SecretsConfig,
    default_max_history: usize,
) -> AgentResult<Arc<dyn ResponseAgent>> {
    let agent: Arc<dyn ResponseAgent> = match config.kind {
        AgentKind::Echo => {
            let echo: EchoConfig = serde_json::from_value(config.kind_config.clone())
                .map_err(|e| AgentError::Config(format!("invalid echo config: {e}")))?;
            Arc::new(EchoAgent::new(echo))
        }
        AgentKind::Llm => {
            let llm: LlmConfig = serde_json::from_value(config.kind_config.clone())
                .map_err(|e| AgentError::Config(format!("invalid llm config: {e}")))?;
            let provider = create_provider(&llm, secrets)?;
            let max_history = config
                .max_history
                .or(llm.max_history)
                .map(|n| n as usize)
                .unwrap_or(default_max_history);
            Arc::new(LlmAgent::new(config.id, llm, provider, max_history))
        }
    };
    Ok(agent)
}
