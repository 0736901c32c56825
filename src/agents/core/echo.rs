//! Echo agent: deterministic, no external calls

use async_trait::async_trait;

use super::ResponseAgent;
use crate::agents::config::{AgentKind, EchoConfig};
use crate::agents::domain::{Conversation, Turn};
use crate::agents::error::AgentResult;

/// Wraps the inbound text with a configured prefix and suffix
pub struct EchoAgent {
    prefix: String,
    suffix: String,
}

impl EchoAgent {
    pub fn new(config: EchoConfig) -> Self {
        Self {
            prefix: config.prefix,
            suffix: config.suffix,
        }
    }
}

#[async_trait]
impl ResponseAgent for EchoAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Echo
    }

    async fn generate(
        &self,
        text: &str,
        conversation: &mut Conversation,
    ) -> AgentResult<Option<String>> {
        let reply = format!("{}{}{}", self.prefix, text, self.suffix);
        conversation.push(Turn::user(text));
        conversation.push(Turn::assistant(reply.clone()));
        Ok(Some(reply))
    }
}
