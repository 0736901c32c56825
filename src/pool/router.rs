//! Admission policy for inbound messages
//!
//! Pure decision logic: given one inbound event and the agent's
//! configuration, decide whether the message reaches the response agent
//! and under which memory scope. First matching rule wins.

use crate::agents::config::{AgentConfig, MemoryScope};
use crate::gateway::InboundMessage;

/// Outcome of the admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Hand the message to the response agent under this scope key
    Dispatch { scope_key: String },
    /// Drop the message without reply
    Ignore,
}

/// Apply the admission policy to one inbound message.
///
/// Rules, in order:
/// 1. the connection's own messages are never answered
/// 2. DMs are answered iff `respond_to_dm` is set
/// 3. guild/channel whitelists gate the context (empty = unrestricted)
/// 4. within an allowed context, only an @-mention of the agent or a
///    direct reply to one of its messages dispatches
pub fn route(message: &InboundMessage, bot_user_id: &str, config: &AgentConfig) -> RouteDecision {
    if message.author_id == bot_user_id {
        return RouteDecision::Ignore;
    }

    if message.is_dm {
        if config.respond_to_dm {
            return dispatch(message, config);
        }
        return RouteDecision::Ignore;
    }

    if !config.guild_whitelist.is_empty() {
        match &message.guild_id {
            Some(guild) if config.guild_whitelist.contains(guild) => {}
            _ => return RouteDecision::Ignore,
        }
    }
    if !config.channel_whitelist.is_empty()
        && !config.channel_whitelist.contains(&message.channel_id)
    {
        return RouteDecision::Ignore;
    }

    let mentioned = message.mentions.iter().any(|id| id == bot_user_id);
    if mentioned || message.is_reply_to_self {
        return dispatch(message, config);
    }

    RouteDecision::Ignore
}

fn dispatch(message: &InboundMessage, config: &AgentConfig) -> RouteDecision {
    let scope_key = match config.memory_scope {
        MemoryScope::PerChannel => message.channel_id.clone(),
        MemoryScope::PerUser => message.author_id.clone(),
    };
    RouteDecision::Dispatch { scope_key }
}
