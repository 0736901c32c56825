//! Pool reconciler: diffs desired state against live connections
//!
//! Runs on a fixed interval and on explicit refresh. A pass computes the
//! to-start, to-stop, and to-restart sets, issues commands without
//! awaiting them, and leaves transitional handles alone until they
//! settle. Running the same pass twice against unchanged state issues
//! nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::handle::{ConnectionHandle, LifecycleState};
use super::supervisor::ConnectionSupervisor;
use super::PoolContext;
use crate::agents::config::AgentConfig;
use crate::agents::error::AgentError;
use crate::config::Settings;
use crate::persistence::AgentRepository;

/// Pool-wide reconciler tuning
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    /// Grace before a stuck graceful stop is force-terminated
    pub stop_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl PoolOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_concurrent: settings.pool.max_concurrent_agents,
            poll_interval: Duration::from_secs(settings.pool.poll_interval_seconds),
            stop_timeout: Duration::from_secs(settings.pool.stop_timeout_seconds),
            shutdown_timeout: Duration::from_secs(settings.pool.shutdown_timeout_seconds),
            backoff_base: Duration::from_millis(settings.pool.backoff_base_ms),
            backoff_cap: Duration::from_millis(settings.pool.backoff_cap_ms),
        }
    }
}

/// Owns the map of live connection handles. Single-writer discipline:
/// this task is the only one that creates, commands, or removes handles;
/// each supervisor task is the only writer of its observed state.
pub struct PoolReconciler {
    repository: Arc<dyn AgentRepository>,
    ctx: Arc<PoolContext>,
    options: PoolOptions,
    handles: HashMap<i64, ConnectionHandle>,
    refresh: Arc<Notify>,
}

impl PoolReconciler {
    pub fn new(
        repository: Arc<dyn AgentRepository>,
        ctx: Arc<PoolContext>,
        options: PoolOptions,
    ) -> Self {
        Self {
            repository,
            ctx,
            options,
            handles: HashMap::new(),
            refresh: Arc::new(Notify::new()),
        }
    }

    /// Handle for signalling an immediate pass after a config change
    pub fn refresh_handle(&self) -> Arc<Notify> {
        self.refresh.clone()
    }

    /// Observed state of one agent's connection, if any
    pub fn state_of(&self, agent_id: i64) -> Option<LifecycleState> {
        self.handles.get(&agent_id).map(|h| h.state())
    }

    /// Agent ids with a tracked handle
    pub fn live_agents(&self) -> Vec<i64> {
        self.handles.keys().copied().collect()
    }

    /// Connections currently occupying a pool slot
    pub fn active_count(&self) -> usize {
        self.handles
            .values()
            .filter(|h| h.state().is_active())
            .count()
    }

    /// Run the periodic reconciliation loop until `shutdown` fires, then
    /// stop every connection.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            poll_interval_s = self.options.poll_interval.as_secs(),
            max_concurrent = self.options.max_concurrent,
            "pool reconciler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.refresh.notified() => {
                    debug!("explicit refresh requested");
                }
                _ = shutdown.changed() => break,
            }

            match self.repository.list_agents().await {
                Ok(desired) => self.reconcile(desired).await,
                // the loop survives a persistence outage; next tick retries
                Err(e) => error!(error = %e, "failed to load desired state"),
            }
        }

        self.shutdown().await;
    }

    /// One reconciliation pass. Idempotent: with unchanged desired state
    /// and settled handles it issues no commands.
    pub async fn reconcile(&mut self, desired: Vec<AgentConfig>) {
        let mut want: HashMap<i64, AgentConfig> = HashMap::new();
        for config in desired {
            if let Err(e) = config.validate() {
                warn!(agent_id = config.id, error = %e, "skipping malformed agent config");
                continue;
            }
            if !config.enabled {
                continue;
            }
            if want.insert(config.id, config).is_some() {
                warn!("duplicate agent id in desired state, keeping the last record");
            }
        }

        self.settle(&want);
        self.mark_errors();

        // to-stop and to-restart. A restart for config drift is a stop
        // now and a fresh start once the old connection settles, never
        // an in-place swap.
        for (id, handle) in self.handles.iter_mut() {
            let state = handle.state();
            if state.is_transitional() {
                // not actionable yet; revisited once the handle settles
                continue;
            }
            if state != LifecycleState::Running {
                // errored handles go through the retry path below
                continue;
            }
            match want.get(id) {
                None => {
                    info!(agent_id = *id, "agent disabled or removed, stopping connection");
                    handle.request_stop();
                }
                Some(config) if handle.fingerprint != config.fingerprint() => {
                    info!(agent_id = *id, "configuration drift detected, restarting connection");
                    handle.request_stop();
                }
                Some(_) => {}
            }
        }

        // errored handles still desired: retry once their backoff elapses
        let due: Vec<i64> = self
            .handles
            .iter()
            .filter(|(id, handle)| {
                matches!(handle.state(), LifecycleState::Errored(_))
                    && want.contains_key(id)
                    && handle.retry_due()
            })
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            let active = self.active_count();
            if active >= self.options.max_concurrent {
                let err = AgentError::Capacity {
                    active,
                    limit: self.options.max_concurrent,
                };
                warn!(agent_id = id, error = %err, "deferring retry");
                continue;
            }
            let (previous, config) = match (self.handles.remove(&id), want.get(&id)) {
                (Some(handle), Some(config)) => (handle, config.clone()),
                _ => continue,
            };
            info!(
                agent_id = id,
                attempt = previous.backoff.attempts(),
                "retrying connection"
            );
            match ConnectionSupervisor::spawn(config, self.ctx.clone(), previous.backoff.clone()) {
                Ok(handle) => {
                    self.handles.insert(id, handle);
                }
                Err(e) => warn!(agent_id = id, error = %e, "failed to restart agent"),
            }
        }

        // to-start: desired, enabled, and not live
        for (id, config) in &want {
            if self.handles.contains_key(id) {
                continue;
            }
            let active = self.active_count();
            if active >= self.options.max_concurrent {
                let err = AgentError::Capacity {
                    active,
                    limit: self.options.max_concurrent,
                };
                warn!(agent_id = *id, error = %err, "deferring agent start");
                continue;
            }
            let backoff = Backoff::new(self.options.backoff_base, self.options.backoff_cap);
            match ConnectionSupervisor::spawn(config.clone(), self.ctx.clone(), backoff) {
                Ok(handle) => {
                    info!(agent_id = *id, agent = %config.name, "starting connection");
                    self.handles.insert(*id, handle);
                }
                Err(e) => warn!(agent_id = *id, error = %e, "failed to start agent"),
            }
        }
    }

    /// Drop handles that have fully stopped, force-terminate stops that
    /// overran the grace period, and release errored handles that are no
    /// longer desired.
    fn settle(&mut self, want: &HashMap<i64, AgentConfig>) {
        let stop_timeout = self.options.stop_timeout;
        let mut remove = Vec::new();
        for (id, handle) in self.handles.iter() {
            match handle.state() {
                LifecycleState::Stopped => remove.push(*id),
                LifecycleState::Stopping if handle.stop_overdue(stop_timeout) => {
                    warn!(agent_id = *id, "graceful stop timed out, force-terminating");
                    handle.force_terminate();
                    remove.push(*id);
                }
                // the supervisor task has already exited
                LifecycleState::Errored(_) if !want.contains_key(id) => remove.push(*id),
                _ => {}
            }
        }
        for id in remove {
            self.handles.remove(&id);
        }
    }

    /// Record newly observed failures and schedule their retries; clear
    /// retry bookkeeping once a connection is healthy again.
    fn mark_errors(&mut self) {
        for handle in self.handles.values_mut() {
            match handle.state() {
                LifecycleState::Errored(reason) => {
                    if handle.next_retry_at.is_none() {
                        let delay = handle.backoff.next_delay();
                        warn!(
                            agent_id = handle.agent_id,
                            error = %reason,
                            retry_in_ms = delay.as_millis() as u64,
                            "connection failed, scheduling retry"
                        );
                        handle.last_error = Some(reason);
                        handle.next_retry_at = Some(Instant::now() + delay);
                    }
                }
                LifecycleState::Running => {
                    if handle.backoff.attempts() > 0 {
                        handle.backoff.reset();
                    }
                    handle.last_error = None;
                }
                _ => {}
            }
        }
    }

    /// Stop all connections concurrently, bounded by the shutdown timeout
    pub async fn shutdown(&mut self) {
        info!(connections = self.handles.len(), "shutting down all connections");

        let mut tasks = Vec::new();
        for (_, mut handle) in self.handles.drain() {
            handle.request_stop();
            tasks.push(handle.into_task());
        }

        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();
        let all = futures::future::join_all(tasks);
        if timeout(self.options.shutdown_timeout, all).await.is_err() {
            warn!("shutdown timed out, aborting remaining connections");
            for abort in aborts {
                abort.abort();
            }
        }

        info!("all connections shut down");
    }
}
