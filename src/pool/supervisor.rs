//! Connection supervisor: lifecycle and plumbing for one agent connection
//!
//! Performs no content logic itself. It owns the state machine of one
//! gateway connection, forwards admitted messages to per-scope workers,
//! and forwards their replies to the gateway sender.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::handle::{ConnectionHandle, LifecycleState, SupervisorCommand};
use super::router::{route, RouteDecision};
use super::{Backoff, PoolContext};
use crate::agents::config::AgentConfig;
use crate::agents::core::{create_agent, ResponseAgent};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::memory::ConversationMemory;
use crate::gateway::{GatewaySender, GatewaySession, InboundMessage};
use crate::utils::split_message;

/// Supervisor task for one connection. The sole writer of the handle's
/// observed state.
pub struct ConnectionSupervisor {
    config: AgentConfig,
    agent: Arc<dyn ResponseAgent>,
    ctx: Arc<PoolContext>,
    state: watch::Sender<LifecycleState>,
    commands: mpsc::Receiver<SupervisorCommand>,
}

impl ConnectionSupervisor {
    /// Build the response agent, spawn the supervisor task, and return
    /// the handle the reconciler tracks it by.
    pub fn spawn(
        config: AgentConfig,
        ctx: Arc<PoolContext>,
        backoff: Backoff,
    ) -> AgentResult<ConnectionHandle> {
        let agent = create_agent(&config, &ctx.secrets, ctx.default_max_history)?;

        // Seeded Starting so a handle occupies a pool slot from the moment
        // it exists, not from the task's first poll
        let (state_tx, state_rx) = watch::channel(LifecycleState::Starting);
        let (command_tx, command_rx) = mpsc::channel(1);
        let agent_id = config.id;
        let agent_name = config.name.clone();
        let fingerprint = config.fingerprint();

        let supervisor = Self {
            config,
            agent,
            ctx,
            state: state_tx,
            commands: command_rx,
        };
        let task = tokio::spawn(supervisor.run());

        Ok(ConnectionHandle::new(
            agent_id,
            agent_name,
            fingerprint,
            state_rx,
            command_tx,
            task,
            backoff,
        ))
    }

    fn transition(&self, next: LifecycleState) {
        debug!(agent_id = self.config.id, state = %next, "lifecycle transition");
        let _ = self.state.send(next);
    }

    async fn run(mut self) {
        self.transition(LifecycleState::Starting);
        info!(agent_id = self.config.id, agent = %self.config.name, "connecting to gateway");

        let connect = self.ctx.gateway.connect(&self.config.gateway_token);
        let session = match timeout(self.ctx.connect_timeout, connect).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                let err = AgentError::Connection(e.to_string());
                warn!(agent_id = self.config.id, error = %err, "gateway handshake failed");
                self.transition(LifecycleState::Errored(err.to_string()));
                return;
            }
            Err(_) => {
                let err = AgentError::Connection("gateway handshake timed out".to_string());
                warn!(agent_id = self.config.id, error = %err, "gateway handshake failed");
                self.transition(LifecycleState::Errored(err.to_string()));
                return;
            }
        };

        let GatewaySession {
            bot_user_id,
            mut events,
            sender,
        } = session;

        self.transition(LifecycleState::Running);
        info!(
            agent_id = self.config.id,
            bot_user_id = %bot_user_id,
            "connection established"
        );

        // one queue per scope key keeps a scope's messages strictly
        // ordered while unrelated scopes proceed in parallel
        let mut queues: HashMap<String, mpsc::Sender<InboundMessage>> = HashMap::new();
        let mut workers = JoinSet::new();

        let commanded = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SupervisorCommand::Stop) | None => break true,
                },
                event = events.recv() => match event {
                    Some(message) => {
                        self.dispatch(message, &bot_user_id, &sender, &mut queues, &mut workers);
                    }
                    None => break false,
                },
            }
        };

        if commanded {
            self.transition(LifecycleState::Stopping);
            // dropping the queues lets workers drain and exit
            queues.clear();

            let grace = self.ctx.stop_grace;
            match timeout(grace, sender.disconnect()).await {
                Ok(Err(e)) => warn!(agent_id = self.config.id, error = %e, "disconnect failed"),
                Err(_) => warn!(agent_id = self.config.id, "disconnect overran grace period"),
                Ok(Ok(())) => {}
            }
            let drained = timeout(grace, async {
                while workers.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!(
                    agent_id = self.config.id,
                    "grace period elapsed, aborting in-flight replies"
                );
                workers.abort_all();
            }

            self.transition(LifecycleState::Stopped);
            info!(agent_id = self.config.id, "connection stopped");
        } else {
            workers.abort_all();
            warn!(agent_id = self.config.id, "gateway connection lost");
            self.transition(LifecycleState::Errored(
                "gateway connection lost".to_string(),
            ));
        }
    }

    fn dispatch(
        &self,
        message: InboundMessage,
        bot_user_id: &str,
        sender: &Arc<dyn GatewaySender>,
        queues: &mut HashMap<String, mpsc::Sender<InboundMessage>>,
        workers: &mut JoinSet<()>,
    ) {
        let scope_key = match route(&message, bot_user_id, &self.config) {
            RouteDecision::Dispatch { scope_key } => scope_key,
            RouteDecision::Ignore => return,
        };

        let queue = queues.entry(scope_key.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(32);
            let worker = ScopeWorker {
                agent_id: self.config.id,
                scope_key,
                memory_cap: self
                    .config
                    .max_history
                    .map(|n| n as usize)
                    .unwrap_or(self.ctx.default_max_history),
                agent: self.agent.clone(),
                memory: self.ctx.memory.clone(),
                sender: sender.clone(),
                max_message_length: self.ctx.max_message_length,
            };
            workers.spawn(worker.run(rx));
            tx
        });

        if queue.try_send(message).is_err() {
            warn!(
                agent_id = self.config.id,
                "scope queue full or closed, dropping message"
            );
        }
    }
}

/// Processes one scope's messages sequentially
struct ScopeWorker {
    agent_id: i64,
    scope_key: String,
    memory_cap: usize,
    agent: Arc<dyn ResponseAgent>,
    memory: Arc<ConversationMemory>,
    sender: Arc<dyn GatewaySender>,
    max_message_length: usize,
}

impl ScopeWorker {
    async fn run(self, mut queue: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = queue.recv().await {
            let conversation = self
                .memory
                .scope_with_cap(self.agent_id, &self.scope_key, self.memory_cap)
                .await;

            let reply = {
                let mut conversation = conversation.lock().await;
                match self.agent.generate(&message.content, &mut conversation).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!(
                            agent_id = self.agent_id,
                            scope = %self.scope_key,
                            error = %e,
                            "reply generation failed"
                        );
                        None
                    }
                }
            };

            // failed or declined replies are dropped silently: internal
            // errors never leak into the chat surface
            let Some(reply) = reply else { continue };

            for chunk in split_message(&reply, self.max_message_length) {
                if let Err(e) = self.sender.send(&message.channel_id, &chunk).await {
                    warn!(agent_id = self.agent_id, error = %e, "failed to send reply");
                    break;
                }
            }
        }
    }
}
