// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent pool supervision.
//!
//! Two concerns interleave on one cadence: the pool loop keeps the number
//! of live workers at the configured target (staggered spawn, retire the
//! newest idle surplus), and the health loop reclaims stale work, tears
//! down stalled sessions, and runs failure recovery for dead agents.

use crate::lifecycle::{self, RecoveryReport};
use gaffer_adapters::{SessionAdapter, VcsAdapter};
use gaffer_core::{AgentId, AgentStatus, Clock, Config, HealthState, Result};
use gaffer_engine::{
    HookEngine, MonitorConfig, SessionManager, StatusBuilder, Worker, WorkerDeps,
    WorkspaceManager,
};
use gaffer_storage::{AgentStateStore, RootLayout, WorkQueue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Bounded wait for workers to finish their current step on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Everything the coordinator needs, threaded explicitly.
pub struct CoordinatorDeps<S, V, C> {
    pub layout: RootLayout,
    pub queue: WorkQueue,
    pub agents: AgentStateStore,
    pub session_adapter: S,
    pub vcs: V,
    pub hooks: Arc<HookEngine>,
    pub clock: C,
    pub cfg: Config,
    /// Base repository workspaces branch from.
    pub base_repo: std::path::PathBuf,
    /// Command line that starts the agent process.
    pub agent_cmd: String,
}

struct WorkerSlot {
    task: JoinHandle<()>,
    retire_tx: watch::Sender<bool>,
    spawned_at: Instant,
}

/// The agent pool supervisor.
pub struct Coordinator<S, V, C> {
    deps: CoordinatorDeps<S, V, C>,
    status: StatusBuilder<C>,
    sessions: SessionManager<S, C>,
    started: Instant,
    slots: Mutex<HashMap<AgentId, WorkerSlot>>,
    failures: Mutex<HashMap<AgentId, u32>>,
    last_spawn: Mutex<Option<Instant>>,
}

impl<S: SessionAdapter, V: VcsAdapter, C: Clock> Coordinator<S, V, C> {
    pub fn new(deps: CoordinatorDeps<S, V, C>) -> Self {
        let status = StatusBuilder::new(
            deps.layout.clone(),
            deps.queue.clone(),
            deps.agents.clone(),
            deps.clock.clone(),
            deps.cfg.heartbeat_timeout(),
        );
        let sessions = SessionManager::new(
            deps.session_adapter.clone(),
            deps.agents.clone(),
            Arc::clone(&deps.hooks),
            deps.clock.clone(),
            deps.cfg.session_startup_wait(),
        );
        Self {
            status,
            sessions,
            started: Instant::now(),
            slots: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            last_spawn: Mutex::new(None),
            deps,
        }
    }

    /// Crash-recovery sweep, delegated to lifecycle.
    pub fn recover(&self) -> std::result::Result<RecoveryReport, crate::lifecycle::LifecycleError> {
        lifecycle::recover(&self.deps.agents, &self.deps.queue)
    }

    /// Supervision loop. Returns on shutdown after stopping the pool.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let interval = self.deps.cfg.heartbeat_interval();
        loop {
            if let Err(e) = self.tick().await {
                error!(error = %e, "supervision tick failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.shutdown_pool().await;
        Ok(())
    }

    /// One supervision pass: pool sizing, health checks, status snapshot.
    pub async fn tick(&self) -> Result<()> {
        self.reap_finished();
        self.tick_pool().await?;
        self.tick_health().await?;
        self.status
            .write(std::process::id(), self.started.elapsed())?;
        Ok(())
    }

    /// Live in-process workers.
    pub fn pool_size(&self) -> usize {
        self.slots.lock().len()
    }

    fn reap_finished(&self) {
        let mut slots = self.slots.lock();
        slots.retain(|agent, slot| {
            if slot.task.is_finished() {
                info!(agent = %agent, "worker task ended");
                false
            } else {
                true
            }
        });
    }

    async fn tick_pool(&self) -> Result<()> {
        let target = self.deps.cfg.parallel_agents;
        let live = self.pool_size();

        if live < target {
            let stagger = self.deps.cfg.agent_startup_stagger();
            let ready = {
                let last = self.last_spawn.lock();
                last.map(|t| t.elapsed() >= stagger).unwrap_or(true)
            };
            // One spawn per pass; the stagger paces successive passes.
            if ready {
                let agent = self.next_agent_id();
                if self.agent_failures(&agent) >= self.deps.cfg.max_agent_failures {
                    warn!(agent = %agent, "not replacing agent past failure budget");
                } else {
                    self.spawn_worker(agent)?;
                    *self.last_spawn.lock() = Some(Instant::now());
                }
            }
        } else if live > target {
            self.retire_surplus(live - target);
        }
        Ok(())
    }

    fn next_agent_id(&self) -> AgentId {
        let slots = self.slots.lock();
        // Reuse the lowest free slot number so retired IDs come back.
        let mut n = 1;
        loop {
            let candidate = AgentId::new(format!("agent-{}", n));
            if !slots.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn agent_failures(&self, agent: &AgentId) -> u32 {
        *self.failures.lock().get(agent).unwrap_or(&0)
    }

    fn spawn_worker(&self, agent: AgentId) -> Result<()> {
        self.deps.agents.ensure_agent(&agent)?;
        self.deps
            .agents
            .write_status(&agent, AgentStatus::Initializing)?;
        self.deps.agents.write_pid(&agent, std::process::id())?;
        self.deps
            .agents
            .touch_heartbeat(&agent, self.deps.clock.epoch_secs())?;

        let worker = Worker::new(
            agent.clone(),
            WorkerDeps {
                queue: self.deps.queue.clone(),
                agents: self.deps.agents.clone(),
                workspaces: WorkspaceManager::new(
                    self.deps.vcs.clone(),
                    self.deps.base_repo.clone(),
                    self.deps.layout.root().join("workspaces"),
                ),
                sessions: self.sessions.clone(),
                session_adapter: self.deps.session_adapter.clone(),
                hooks: Arc::clone(&self.deps.hooks),
                clock: self.deps.clock.clone(),
                monitor_cfg: MonitorConfig {
                    poll_interval: self.deps.cfg.heartbeat_interval(),
                    stall_threshold: self.deps.cfg.stall_threshold(),
                    session_timeout: self.deps.cfg.session_timeout(),
                },
                agent_cmd: self.deps.agent_cmd.clone(),
            },
        );

        let (retire_tx, retire_rx) = watch::channel(false);
        let idle_wait = self.deps.cfg.heartbeat_interval();
        let task = tokio::spawn(worker_loop(worker, retire_rx, idle_wait));

        info!(agent = %agent, "worker spawned");
        self.slots.lock().insert(
            agent,
            WorkerSlot {
                task,
                retire_tx,
                spawned_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Ask the newest idle workers to retire after their current claim.
    fn retire_surplus(&self, surplus: usize) {
        let slots = self.slots.lock();
        let mut candidates: Vec<(&AgentId, &WorkerSlot)> = slots
            .iter()
            .filter(|(agent, _)| {
                self.deps
                    .agents
                    .read_status(agent)
                    .ok()
                    .flatten()
                    .map(|s| s.status == AgentStatus::Idle)
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort_by_key(|(_, slot)| std::cmp::Reverse(slot.spawned_at));
        for (agent, slot) in candidates.into_iter().take(surplus) {
            info!(agent = %agent, "retiring surplus worker");
            let _ = slot.retire_tx.send(true);
        }
    }

    async fn tick_health(&self) -> Result<()> {
        // Stale work: old claims whose owner is not healthy.
        let healthy = |owner: &AgentId| self.status.health(owner) == HealthState::Healthy;
        let reclaimed = self
            .deps
            .queue
            .reclaim_stale(
                chrono::Duration::seconds(self.deps.cfg.stale_work_timeout as i64),
                healthy,
            )?;
        for item in &reclaimed {
            warn!(item = %item, "reclaimed stale work");
        }

        // Per-agent health for agents this process does not drive
        // (leftovers from a crashed coordinator) and stalled teardown.
        for agent in self.deps.agents.list_agents()? {
            match self.status.health(&agent) {
                HealthState::Healthy => {}
                HealthState::Stalled => {
                    // Alive PID, stale heartbeat: force teardown first;
                    // only then is the claim released.
                    warn!(agent = %agent, "stalled agent, forcing teardown");
                    let _ = self.sessions.archive_forensics(&agent).await;
                    if let Err(e) = self.sessions.stop(&agent, true).await {
                        warn!(agent = %agent, error = %e, "stalled teardown failed");
                        continue;
                    }
                    self.release_agent_claims(&agent)?;
                    self.record_failure(&agent)?;
                }
                HealthState::Dead => {
                    if self.slots.lock().contains_key(&agent) {
                        // Driven by a live worker task; the worker handles
                        // its own item outcome.
                        continue;
                    }
                    self.recover_dead_agent(&agent).await?;
                }
            }
        }
        Ok(())
    }

    /// Failure recovery for an agent nobody is driving.
    async fn recover_dead_agent(&self, agent: &AgentId) -> Result<()> {
        info!(agent = %agent, "recovering dead agent");
        self.release_agent_claims(agent)?;
        let _ = self.sessions.archive_forensics(agent).await;
        let _ = self.sessions.stop(agent, true).await;

        let workspaces = WorkspaceManager::new(
            self.deps.vcs.clone(),
            self.deps.base_repo.clone(),
            self.deps.layout.root().join("workspaces"),
        );
        if let Err(e) = workspaces.destroy(agent, true).await {
            warn!(agent = %agent, error = %e, "workspace destroy failed");
        }

        self.deps.agents.write_status(agent, AgentStatus::Dead)?;
        let failures = self.record_failure(agent)?;
        if failures >= self.deps.cfg.max_agent_failures {
            error!(
                agent = %agent,
                failures,
                "agent past failure budget, not replacing"
            );
        }
        Ok(())
    }

    fn release_agent_claims(&self, agent: &AgentId) -> Result<()> {
        for item in self.deps.queue.claims_owned_by(agent)? {
            warn!(agent = %agent, item = %item, "releasing claim");
            self.deps.queue.release(&item)?;
        }
        Ok(())
    }

    fn record_failure(&self, agent: &AgentId) -> Result<u32> {
        let mut failures = self.failures.lock();
        let count = failures.entry(agent.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Stop spawning, retire every worker, wait bounded, then force-kill
    /// sessions that remain.
    async fn shutdown_pool(&self) {
        info!("shutting down agent pool");
        let agents: Vec<AgentId> = {
            let slots = self.slots.lock();
            for slot in slots.values() {
                let _ = slot.retire_tx.send(true);
            }
            slots.keys().cloned().collect()
        };

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            self.reap_finished();
            if self.pool_size() == 0 || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        for agent in agents {
            if let Err(e) = self.sessions.stop(&agent, true).await {
                warn!(agent = %agent, error = %e, "forced session stop failed");
            }
            let _ = self.deps.agents.write_status(&agent, AgentStatus::Dead);
        }
        // Final snapshot so observers see the drained pool.
        let _ = self
            .status
            .write(std::process::id(), self.started.elapsed());
    }
}

/// One worker's claim-and-run loop; exits when retirement flips.
async fn worker_loop<S: SessionAdapter, V: VcsAdapter, C: Clock>(
    worker: Worker<S, V, C>,
    retire_rx: watch::Receiver<bool>,
    idle_wait: Duration,
) {
    loop {
        if *retire_rx.borrow() {
            return;
        }
        match worker.run_once(retire_rx.clone()).await {
            Ok(Some(report)) => {
                info!(agent = %worker.id(), report = ?report, "work cycle finished");
            }
            Ok(None) => {
                let mut retire = retire_rx.clone();
                tokio::select! {
                    _ = tokio::time::sleep(idle_wait) => {}
                    changed = retire.changed() => {
                        if changed.is_err() || *retire.borrow() {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                error!(agent = %worker.id(), error = %e, "work cycle failed");
                tokio::time::sleep(idle_wait).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
