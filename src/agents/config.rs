//! Desired-state configuration for one agent connection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::{AgentError, AgentResult};

/// Response-agent variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Deterministic echo with configured prefix/suffix
    #[default]
    Echo,
    /// LLM-backed responder with conversation history
    Llm,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Echo => write!(f, "echo"),
            AgentKind::Llm => write!(f, "llm"),
        }
    }
}

/// Partitioning key for conversation memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    /// One conversation per channel
    PerChannel,
    /// One conversation per author, across channels
    #[default]
    PerUser,
}

/// One agent's desired state, owned by the persistence layer.
///
/// The core only ever observes these records; it never writes them back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Stable identity
    pub id: i64,
    /// Display name
    pub name: String,
    /// Credential the gateway connection is opened with
    pub gateway_token: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether direct messages are answered at all
    #[serde(default = "default_true")]
    pub respond_to_dm: bool,
    /// Allowed guild ids; empty means unrestricted
    #[serde(default)]
    pub guild_whitelist: Vec<String>,
    /// Allowed channel ids; empty means unrestricted
    #[serde(default)]
    pub channel_whitelist: Vec<String>,
    #[serde(default)]
    pub kind: AgentKind,
    /// Variant-specific configuration blob, deserialized per `kind`
    #[serde(default = "default_kind_config")]
    pub kind_config: Value,
    #[serde(default)]
    pub memory_scope: MemoryScope,
    /// Per-agent override of the pool-wide history cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history: Option<u32>,
    /// Last modification time of the record
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_kind_config() -> Value {
    Value::Object(Default::default())
}

impl AgentConfig {
    /// Check the record for defects that make the agent unstartable
    pub fn validate(&self) -> AgentResult<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::Config("agent name is empty".to_string()));
        }
        if self.gateway_token.trim().is_empty() {
            return Err(AgentError::Config(format!(
                "agent '{}' has an empty gateway token",
                self.name
            )));
        }
        if !self.kind_config.is_object() && !self.kind_config.is_null() {
            return Err(AgentError::Config(format!(
                "agent '{}' has a non-object variant config",
                self.name
            )));
        }
        Ok(())
    }

    /// Content hash over every field whose change requires a restart.
    ///
    /// A running connection is never mutated in place: when this value
    /// drifts from the one its handle was started with, the reconciler
    /// stops the connection and starts a fresh one.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.gateway_token.as_bytes());
        hasher.update([0xff]);
        hasher.update(self.kind.to_string().as_bytes());
        hasher.update([0xff]);
        hasher.update(self.kind_config.to_string().as_bytes());
        hasher.update([0xff]);
        hasher.update([self.respond_to_dm as u8]);
        for id in &self.guild_whitelist {
            hasher.update(id.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0xff]);
        for id in &self.channel_whitelist {
            hasher.update(id.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0xff]);
        hasher.update(format!("{:?}", self.memory_scope).as_bytes());
        hasher.update([0xff]);
        if let Some(n) = self.max_history {
            hasher.update(n.to_be_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Configuration blob for the `echo` variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

/// Supported text-generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderKind::OpenAi => write!(f, "openai"),
            LlmProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Configuration blob for the `llm` variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Turns of history assembled into each request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Bound on each provider call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Custom base URL for self-hosted or proxied endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            max_history: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_seconds: default_request_timeout(),
            base_url: None,
        }
    }
}
