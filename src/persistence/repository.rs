//! Repository trait and SQL implementation for the agents table

use async_trait::async_trait;
use sqlx::Row;
use tracing::warn;

use crate::agents::config::AgentConfig;
use crate::persistence::error::PersistenceError;
use crate::persistence::models::AgentRow;
use crate::persistence::pool::ConnectionPool;

const CREATE_AGENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    gateway_token TEXT NOT NULL,
    enabled BIGINT NOT NULL DEFAULT 1,
    respond_to_dm BIGINT NOT NULL DEFAULT 1,
    guild_whitelist TEXT NOT NULL DEFAULT '[]',
    channel_whitelist TEXT NOT NULL DEFAULT '[]',
    kind TEXT NOT NULL DEFAULT 'echo',
    kind_config TEXT NOT NULL DEFAULT '{}',
    memory_scope TEXT NOT NULL DEFAULT 'per_user',
    max_history BIGINT,
    updated_at TEXT NOT NULL
)
"#;

/// Source of desired state for the pool reconciler
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Fetch every agent record, enabled or not
    async fn list_agents(&self) -> Result<Vec<AgentConfig>, PersistenceError>;
}

/// SQL-backed agent repository (SQLite or PostgreSQL)
pub struct SqlAgentRepository {
    pool: ConnectionPool,
}

impl SqlAgentRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Create the agents table if it does not exist yet
    pub async fn init_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(CREATE_AGENTS_TABLE)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    /// Insert or replace one agent record
    pub async fn upsert_agent(&self, config: &AgentConfig) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO agents (
                id, name, gateway_token, enabled, respond_to_dm,
                guild_whitelist, channel_whitelist, kind, kind_config,
                memory_scope, max_history, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                gateway_token = excluded.gateway_token,
                enabled = excluded.enabled,
                respond_to_dm = excluded.respond_to_dm,
                guild_whitelist = excluded.guild_whitelist,
                channel_whitelist = excluded.channel_whitelist,
                kind = excluded.kind,
                kind_config = excluded.kind_config,
                memory_scope = excluded.memory_scope,
                max_history = excluded.max_history,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(config.id)
        .bind(&config.name)
        .bind(&config.gateway_token)
        .bind(config.enabled as i64)
        .bind(config.respond_to_dm as i64)
        .bind(serde_json::to_string(&config.guild_whitelist)?)
        .bind(serde_json::to_string(&config.channel_whitelist)?)
        .bind(enum_tag(&config.kind)?)
        .bind(serde_json::to_string(&config.kind_config)?)
        .bind(enum_tag(&config.memory_scope)?)
        .bind(config.max_history.map(|n| n as i64))
        .bind(config.updated_at.to_rfc3339())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    /// Delete one agent record; returns whether a row was removed
    pub async fn delete_agent(&self, id: i64) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id)
            .execute(self.pool.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn parse_row(row: &sqlx::any::AnyRow) -> Result<AgentRow, PersistenceError> {
        Ok(AgentRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            gateway_token: row.try_get("gateway_token")?,
            enabled: row.try_get("enabled")?,
            respond_to_dm: row.try_get("respond_to_dm")?,
            guild_whitelist: row.try_get("guild_whitelist")?,
            channel_whitelist: row.try_get("channel_whitelist")?,
            kind: row.try_get("kind")?,
            kind_config: row.try_get("kind_config")?,
            memory_scope: row.try_get("memory_scope")?,
            max_history: row.try_get("max_history")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn list_agents(&self) -> Result<Vec<AgentConfig>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY id")
            .fetch_all(self.pool.pool())
            .await?;

        // one malformed record never poisons the whole pass
        let mut configs = Vec::with_capacity(rows.len());
        for row in &rows {
            let decoded = Self::parse_row(row).and_then(AgentRow::into_config);
            match decoded {
                Ok(config) => configs.push(config),
                Err(e) => warn!(error = %e, "skipping undecodable agent record"),
            }
        }
        Ok(configs)
    }
}

/// Serialize a unit enum to its serde string tag for storage
fn enum_tag<T: serde::Serialize>(value: &T) -> Result<String, PersistenceError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(tag) => Ok(tag),
        other => Err(PersistenceError::Connection(format!(
            "expected string tag, got {other}"
        ))),
    }
}
