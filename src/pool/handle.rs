//! Runtime record for one live connection

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::backoff::Backoff;

/// Observed lifecycle of a connection.
///
/// Monotonic within one attempt: Stopped → Starting → Running → Stopping
/// → Stopped, with Errored reachable from Starting or Running. Only the
/// owning supervisor task writes this; the reconciler only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Errored(String),
}

impl LifecycleState {
    /// States that occupy a pool slot
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LifecycleState::Starting | LifecycleState::Running | LifecycleState::Stopping
        )
    }

    /// States the reconciler must not act on yet
    pub fn is_transitional(&self) -> bool {
        matches!(self, LifecycleState::Starting | LifecycleState::Stopping)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
            LifecycleState::Errored(_) => write!(f, "errored"),
        }
    }
}

/// Target-state command issued by the reconciler
#[derive(Debug)]
pub enum SupervisorCommand {
    Stop,
}

/// One live connection as the reconciler sees it.
///
/// The split write discipline: the supervisor task owns the observed
/// state (via the watch channel); the reconciler owns everything else on
/// this struct, including the retry bookkeeping.
pub struct ConnectionHandle {
    pub agent_id: i64,
    pub agent_name: String,
    /// Config fingerprint the connection was started with
    pub fingerprint: String,
    state: watch::Receiver<LifecycleState>,
    commands: mpsc::Sender<SupervisorCommand>,
    task: JoinHandle<()>,
    pub started_at: Instant,
    /// Retry backoff, carried across respawns of the same agent
    pub backoff: Backoff,
    pub last_error: Option<String>,
    stop_issued_at: Option<Instant>,
    /// Set once an error is observed; cleared on respawn
    pub next_retry_at: Option<Instant>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        agent_id: i64,
        agent_name: String,
        fingerprint: String,
        state: watch::Receiver<LifecycleState>,
        commands: mpsc::Sender<SupervisorCommand>,
        task: JoinHandle<()>,
        backoff: Backoff,
    ) -> Self {
        Self {
            agent_id,
            agent_name,
            fingerprint,
            state,
            commands,
            task,
            started_at: Instant::now(),
            backoff,
            last_error: None,
            stop_issued_at: None,
            next_retry_at: None,
        }
    }

    /// Current observed state
    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    /// Ask the supervisor to stop. Non-blocking and idempotent; the
    /// command channel holds one slot and a second request is a no-op.
    pub fn request_stop(&mut self) {
        if self.stop_issued_at.is_none() {
            let _ = self.commands.try_send(SupervisorCommand::Stop);
            self.stop_issued_at = Some(Instant::now());
        }
    }

    /// Whether a requested stop has overrun its grace period
    pub fn stop_overdue(&self, timeout: Duration) -> bool {
        self.stop_issued_at
            .map(|at| at.elapsed() >= timeout)
            .unwrap_or(false)
    }

    /// Whether the error backoff has elapsed
    pub fn retry_due(&self) -> bool {
        self.next_retry_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }

    /// Abort the supervisor task outright, trading lost work for liveness
    pub fn force_terminate(&self) {
        self.task.abort();
    }

    /// Whether the supervisor task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Surrender the task handle for a final awaited shutdown
    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}
