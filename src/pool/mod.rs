//! The agent pool: reconciler, connection supervisors, and routing
//!
//! Desired state flows in from the persistence layer; the reconciler
//! diffs it against the live set of connection handles and issues
//! start/stop commands. Each connection runs as its own task.

pub mod backoff;
pub mod handle;
pub mod reconciler;
pub mod router;
pub mod supervisor;

pub use backoff::Backoff;
pub use handle::{ConnectionHandle, LifecycleState, SupervisorCommand};
pub use reconciler::{PoolOptions, PoolReconciler};
pub use router::{route, RouteDecision};
pub use supervisor::ConnectionSupervisor;

use std::sync::Arc;
use std::time::Duration;

use crate::agents::memory::ConversationMemory;
use crate::config::{SecretsConfig, Settings};
use crate::gateway::GatewayClient;

/// Shared dependencies handed to every connection supervisor
pub struct PoolContext {
    pub gateway: Arc<dyn GatewayClient>,
    pub memory: Arc<ConversationMemory>,
    pub secrets: SecretsConfig,
    /// Bound on the gateway handshake
    pub connect_timeout: Duration,
    /// Grace period for graceful stop before in-flight work is aborted
    pub stop_grace: Duration,
    /// Outbound replies are chunked to this length; stored memory is not
    pub max_message_length: usize,
    /// Pool-wide conversation cap, overridable per agent
    pub default_max_history: usize,
}

impl PoolContext {
    pub fn from_settings(settings: &Settings, gateway: Arc<dyn GatewayClient>) -> Self {
        Self {
            gateway,
            memory: Arc::new(ConversationMemory::new(settings.memory.max_history)),
            secrets: settings.secrets.clone(),
            connect_timeout: Duration::from_secs(settings.gateway.connect_timeout_seconds),
            stop_grace: Duration::from_secs(settings.pool.stop_timeout_seconds),
            max_message_length: settings.gateway.max_message_length,
            default_max_history: settings.memory.max_history,
        }
    }
}
