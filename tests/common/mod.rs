//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

use hydra::agents::config::{AgentConfig, AgentKind, MemoryScope};
use hydra::agents::memory::ConversationMemory;
use hydra::config::SecretsConfig;
use hydra::gateway::{
    GatewayClient, GatewayError, GatewayResult, GatewaySender, GatewaySession, InboundMessage,
};
use hydra::persistence::{AgentRepository, PersistenceError};
use hydra::pool::{PoolContext, PoolOptions};

/// Scriptable gateway double. Each connect yields a [`SessionProbe`]
/// through which a test injects events and inspects outbound sends.
pub struct MockGateway {
    connects: AtomicUsize,
    fail_next: AtomicUsize,
    hang_disconnect: AtomicBool,
    send_delay_ms: AtomicU64,
    probes: StdMutex<Vec<SessionProbe>>,
}

struct SessionShared {
    events_tx: Mutex<Option<mpsc::Sender<InboundMessage>>>,
    sent: Mutex<Vec<(String, String)>>,
    disconnected: AtomicBool,
    hang_disconnect: bool,
    send_delay: Duration,
}

/// Test-side view of one mock connection
#[derive(Clone)]
pub struct SessionProbe {
    shared: Arc<SessionShared>,
}

impl SessionProbe {
    /// Deliver one inbound event to the connection
    pub async fn push(&self, message: InboundMessage) {
        let guard = self.shared.events_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(message).await;
        }
    }

    /// Close the event stream, simulating a dropped connection
    pub async fn sever(&self) {
        self.shared.events_tx.lock().await.take();
    }

    /// Messages the connection sent, as (channel_id, text) pairs
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.shared.sent.lock().await.clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.shared.disconnected.load(Ordering::SeqCst)
    }
}

struct MockSender {
    shared: Arc<SessionShared>,
}

#[async_trait]
impl GatewaySender for MockSender {
    async fn send(&self, channel_id: &str, text: &str) -> GatewayResult<()> {
        if !self.shared.send_delay.is_zero() {
            tokio::time::sleep(self.shared.send_delay).await;
        }
        self.shared
            .sent
            .lock()
            .await
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn disconnect(&self) -> GatewayResult<()> {
        self.shared.disconnected.store(true, Ordering::SeqCst);
        if self.shared.hang_disconnect {
            futures::future::pending::<()>().await;
        }
        self.shared.events_tx.lock().await.take();
        Ok(())
    }
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            hang_disconnect: AtomicBool::new(false),
            send_delay_ms: AtomicU64::new(0),
            probes: StdMutex::new(Vec::new()),
        })
    }

    /// Make the next `n` connect attempts fail with a handshake error
    pub fn fail_next_connects(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make future sessions hang forever in `disconnect`
    pub fn set_hang_disconnect(&self, on: bool) {
        self.hang_disconnect.store(on, Ordering::SeqCst);
    }

    /// Make every send on future sessions stall for `delay` first
    pub fn set_send_delay(&self, delay: Duration) {
        self.send_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn probe(&self, index: usize) -> Option<SessionProbe> {
        self.probes.lock().unwrap().get(index).cloned()
    }

    pub fn latest_probe(&self) -> Option<SessionProbe> {
        self.probes.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn connect(&self, token: &str) -> GatewayResult<GatewaySession> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if token.trim().is_empty() {
            return Err(GatewayError::Handshake("empty token".to_string()));
        }
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Handshake("scripted failure".to_string()));
        }

        let (events_tx, events) = mpsc::channel(16);
        let shared = Arc::new(SessionShared {
            events_tx: Mutex::new(Some(events_tx)),
            sent: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
            hang_disconnect: self.hang_disconnect.load(Ordering::SeqCst),
            send_delay: Duration::from_millis(self.send_delay_ms.load(Ordering::SeqCst)),
        });

        self.probes.lock().unwrap().push(SessionProbe {
            shared: shared.clone(),
        });

        Ok(GatewaySession {
            bot_user_id: "bot-self".to_string(),
            events,
            sender: Arc::new(MockSender { shared }),
        })
    }
}

/// In-memory desired-state table
pub struct MemoryRepository {
    agents: StdMutex<Vec<AgentConfig>>,
    fail: AtomicBool,
}

impl MemoryRepository {
    pub fn new(agents: Vec<AgentConfig>) -> Arc<Self> {
        Arc::new(Self {
            agents: StdMutex::new(agents),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_agents(&self, agents: Vec<AgentConfig>) {
        *self.agents.lock().unwrap() = agents;
    }

    /// Make `list_agents` return an error until cleared
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentRepository for MemoryRepository {
    async fn list_agents(&self) -> Result<Vec<AgentConfig>, PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError::Connection(
                "scripted outage".to_string(),
            ));
        }
        Ok(self.agents.lock().unwrap().clone())
    }
}

/// Echo agent fixture with permissive routing
pub fn echo_agent(id: i64, name: &str) -> AgentConfig {
    AgentConfig {
        id,
        name: name.to_string(),
        gateway_token: format!("token-{id}"),
        enabled: true,
        respond_to_dm: true,
        guild_whitelist: Vec::new(),
        channel_whitelist: Vec::new(),
        kind: AgentKind::Echo,
        kind_config: json!({}),
        memory_scope: MemoryScope::PerUser,
        max_history: None,
        updated_at: Utc::now(),
    }
}

/// DM fixture routed straight to the agent
pub fn inbound_dm(author_id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        author_id: author_id.to_string(),
        channel_id: format!("dm-{author_id}"),
        guild_id: None,
        content: content.to_string(),
        is_dm: true,
        mentions: Vec::new(),
        is_reply_to_self: false,
    }
}

/// Guild-channel message fixture that mentions the connection
pub fn inbound_mention(author_id: &str, channel_id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        author_id: author_id.to_string(),
        channel_id: channel_id.to_string(),
        guild_id: Some("guild-1".to_string()),
        content: content.to_string(),
        is_dm: false,
        mentions: vec!["bot-self".to_string()],
        is_reply_to_self: false,
    }
}

/// Pool context tuned for fast tests
pub fn test_context(gateway: Arc<dyn GatewayClient>) -> Arc<PoolContext> {
    Arc::new(PoolContext {
        gateway,
        memory: Arc::new(ConversationMemory::new(20)),
        secrets: SecretsConfig::default(),
        connect_timeout: Duration::from_secs(5),
        stop_grace: Duration::from_millis(500),
        max_message_length: 2_000,
        default_max_history: 20,
    })
}

/// Reconciler options tuned for fast tests
pub fn test_options() -> PoolOptions {
    PoolOptions {
        max_concurrent: 50,
        poll_interval: Duration::from_millis(50),
        stop_timeout: Duration::from_millis(500),
        shutdown_timeout: Duration::from_secs(2),
        backoff_base: Duration::from_millis(20),
        backoff_cap: Duration::from_millis(200),
    }
}

/// Poll `predicate` until it holds or the deadline passes
pub async fn wait_for<F>(deadline: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
