//! Messaging-gateway client interface
//!
//! The pool core never builds wire-protocol frames. It consumes this
//! interface; a real chat-gateway adapter implements it out of tree. The
//! bundled [`LoopbackGateway`] is a development driver that accepts any
//! non-empty token, produces no events, and logs outbound sends.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Errors surfaced by gateway adapters
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connect/identify handshake failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Transport failure on an established connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection closed by the remote side
    #[error("Connection closed")]
    Closed,

    /// Operation exceeded its bounded timeout
    #[error("Gateway operation timed out")]
    Timeout,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// One inbound message event, already flattened by the gateway adapter
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Author's external user id
    pub author_id: String,
    /// Channel (or DM channel) the message arrived on
    pub channel_id: String,
    /// Guild context, absent for direct messages
    pub guild_id: Option<String>,
    /// Message text
    pub content: String,
    /// Whether this arrived as a direct message
    pub is_dm: bool,
    /// User ids @-mentioned in the message
    pub mentions: Vec<String>,
    /// Whether this is a direct reply to a message the connection sent
    pub is_reply_to_self: bool,
}

/// A live connection produced by [`GatewayClient::connect`].
///
/// The event stream closing signals a connection fault or a remote
/// disconnect; the supervisor decides which it is.
pub struct GatewaySession {
    /// The connection's own user id on the gateway
    pub bot_user_id: String,
    /// Inbound message events
    pub events: mpsc::Receiver<InboundMessage>,
    /// Outbound half of the connection
    pub sender: Arc<dyn GatewaySender>,
}

/// Connection factory for one gateway
#[async_trait]
pub trait GatewayClient: Send + Sync + 'static {
    /// Open a connection authenticated by `token`
    async fn connect(&self, token: &str) -> GatewayResult<GatewaySession>;
}

/// Outbound half of an established connection
#[async_trait]
pub trait GatewaySender: Send + Sync {
    /// Send `text` to a channel or DM target
    async fn send(&self, channel_id: &str, text: &str) -> GatewayResult<()>;

    /// Close the connection gracefully
    async fn disconnect(&self) -> GatewayResult<()>;
}

/// Development driver standing in for a real chat-gateway adapter
#[derive(Debug, Default)]
pub struct LoopbackGateway;

#[async_trait]
impl GatewayClient for LoopbackGateway {
    async fn connect(&self, token: &str) -> GatewayResult<GatewaySession> {
        if token.trim().is_empty() {
            return Err(GatewayError::Handshake("empty token".to_string()));
        }

        let (events_tx, events) = mpsc::channel(16);
        Ok(GatewaySession {
            bot_user_id: "loopback".to_string(),
            events,
            sender: Arc::new(LoopbackSender {
                // keeps the event stream open until disconnect
                events_tx: Mutex::new(Some(events_tx)),
            }),
        })
    }
}

struct LoopbackSender {
    events_tx: Mutex<Option<mpsc::Sender<InboundMessage>>>,
}

#[async_trait]
impl GatewaySender for LoopbackSender {
    async fn send(&self, channel_id: &str, text: &str) -> GatewayResult<()> {
        tracing::info!(channel_id, text, "loopback send");
        Ok(())
    }

    async fn disconnect(&self) -> GatewayResult<()> {
        self.events_tx.lock().await.take();
        Ok(())
    }
}
