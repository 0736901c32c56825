//! In-process conversation memory
//!
//! History is keyed by (agent id, scope key) and capped with FIFO
//! eviction. Nothing is persisted; losing memory on restart is accepted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::agents::domain::{Conversation, Turn};

type ScopeId = (i64, String);

/// Shared conversation store.
///
/// The outer map lock is only held long enough to fetch the per-scope
/// `Arc<Mutex<Conversation>>`, so appends on distinct scopes never contend
/// while appends on the same scope are strictly sequential.
pub struct ConversationMemory {
    scopes: RwLock<HashMap<ScopeId, Arc<Mutex<Conversation>>>>,
    default_max_turns: usize,
}

impl ConversationMemory {
    pub fn new(default_max_turns: usize) -> Self {
        Self {
            scopes: RwLock::new(HashMap::new()),
            default_max_turns,
        }
    }

    /// Get the conversation for a scope, creating an empty one on first
    /// access. An existing scope whose cap differs from `max_turns` is
    /// re-capped (evicting the oldest turns), so a lowered per-agent
    /// `max_history` takes effect on scopes that outlived the restart.
    pub async fn scope_with_cap(
        &self,
        agent_id: i64,
        scope_key: &str,
        max_turns: usize,
    ) -> Arc<Mutex<Conversation>> {
        let convo = self.fetch(agent_id, scope_key, max_turns).await;
        {
            let mut convo = convo.lock().await;
            if convo.max_turns() != max_turns {
                convo.set_max_turns(max_turns);
            }
        }
        convo
    }

    /// Read-side get-or-create with the pool-wide default cap; never
    /// disturbs the cap of an existing scope.
    pub async fn scope(&self, agent_id: i64, scope_key: &str) -> Arc<Mutex<Conversation>> {
        self.fetch(agent_id, scope_key, self.default_max_turns).await
    }

    async fn fetch(
        &self,
        agent_id: i64,
        scope_key: &str,
        create_cap: usize,
    ) -> Arc<Mutex<Conversation>> {
        let key = (agent_id, scope_key.to_string());
        if let Some(convo) = self.scopes.read().await.get(&key) {
            return convo.clone();
        }

        let mut scopes = self.scopes.write().await;
        scopes
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(create_cap))))
            .clone()
    }

    /// Append one turn to a scope's conversation
    pub async fn append(&self, agent_id: i64, scope_key: &str, turn: Turn) {
        let convo = self.scope(agent_id, scope_key).await;
        convo.lock().await.push(turn);
    }

    /// Snapshot of a scope's history, oldest first
    pub async fn history(&self, agent_id: i64, scope_key: &str) -> Vec<Turn> {
        let convo = self.scope(agent_id, scope_key).await;
        let convo = convo.lock().await;
        convo.turns().cloned().collect()
    }

    /// Number of tracked scopes, across all agents
    pub async fn scope_count(&self) -> usize {
        self.scopes.read().await.len()
    }
}
