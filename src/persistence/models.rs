//! Database models for the persistence layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::config::{AgentConfig, AgentKind, MemoryScope};
use crate::persistence::error::PersistenceError;

/// Agent record as stored in the `agents` table
///
/// Backend-portable column types only: booleans as 0/1 integers, lists
/// and the kind config as JSON text, timestamps as RFC 3339 text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: i64,
    pub name: String,
    pub gateway_token: String,
    pub enabled: i64,
    pub respond_to_dm: i64,
    /// JSON array of guild ids
    pub guild_whitelist: String,
    /// JSON array of channel ids
    pub channel_whitelist: String,
    /// Agent kind discriminator ("echo", "llm")
    pub kind: String,
    /// JSON object with kind-specific settings
    pub kind_config: String,
    /// Memory scoping ("per_user", "per_channel")
    pub memory_scope: String,
    pub max_history: Option<i64>,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

impl AgentRow {
    /// Decode the stored row into a domain config
    pub fn into_config(self) -> Result<AgentConfig, PersistenceError> {
        let malformed = |reason: String| PersistenceError::Malformed { id: self.id, reason };

        let kind: AgentKind = serde_json::from_value(Value::String(self.kind.clone()))
            .map_err(|e| malformed(format!("unknown agent kind '{}': {}", self.kind, e)))?;
        let memory_scope: MemoryScope =
            serde_json::from_value(Value::String(self.memory_scope.clone()))
                .map_err(|e| malformed(format!("unknown memory scope '{}': {}", self.memory_scope, e)))?;

        let guild_whitelist: Vec<String> = serde_json::from_str(&self.guild_whitelist)
            .map_err(|e| malformed(format!("invalid guild whitelist: {}", e)))?;
        let channel_whitelist: Vec<String> = serde_json::from_str(&self.channel_whitelist)
            .map_err(|e| malformed(format!("invalid channel whitelist: {}", e)))?;
        let kind_config: Value = serde_json::from_str(&self.kind_config)
            .map_err(|e| malformed(format!("invalid kind config: {}", e)))?;

        let updated_at: DateTime<Utc> = self
            .updated_at
            .parse()
            .map_err(|e| malformed(format!("invalid updated_at timestamp: {}", e)))?;

        Ok(AgentConfig {
            id: self.id,
            name: self.name,
            gateway_token: self.gateway_token,
            enabled: self.enabled != 0,
            respond_to_dm: self.respond_to_dm != 0,
            guild_whitelist,
            channel_whitelist,
            kind,
            kind_config,
            memory_scope,
            max_history: self.max_history.map(|n| n as u32),
            updated_at,
        })
    }
}
