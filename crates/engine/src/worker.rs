// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent work cycle: claim, prepare, run, report.
//!
//! The worker iterates the sorted available backlog and attempts each
//! claim in order, falling through on `AlreadyClaimed`; losing a race
//! is normal, not an error. A claimed item gets a workspace, a bootstrap
//! prompt file, and a session; the monitor decides how the run ended and
//! the worker reports completed/failed/released accordingly.

use crate::monitor::{MonitorConfig, MonitorOutcome, SessionMonitor};
use crate::session::SessionManager;
use crate::workspace::WorkspaceManager;
use crate::hooks::{HookContext, HookEngine, HookEvent};
use gaffer_adapters::{SessionAdapter, StreamWatcher, VcsAdapter, WatcherConfig};
use gaffer_core::{AgentId, AgentStatus, Clock, Result, WorkItem};
use gaffer_storage::{AgentStateStore, ClaimOutcome, WorkQueue};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// How one work cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkReport {
    Completed { item: gaffer_core::ItemId },
    Failed { item: gaffer_core::ItemId, reason: String },
    Released { item: gaffer_core::ItemId },
}

/// Everything a worker needs, threaded explicitly.
pub struct WorkerDeps<S, V, C> {
    pub queue: WorkQueue,
    pub agents: AgentStateStore,
    pub workspaces: WorkspaceManager<V>,
    pub sessions: SessionManager<S, C>,
    pub session_adapter: S,
    pub hooks: Arc<HookEngine>,
    pub clock: C,
    pub monitor_cfg: MonitorConfig,
    /// Command line that starts the agent process.
    pub agent_cmd: String,
}

/// One agent's claim-and-run loop.
pub struct Worker<S, V, C> {
    id: AgentId,
    deps: WorkerDeps<S, V, C>,
}

impl<S: SessionAdapter, V: VcsAdapter, C: Clock> Worker<S, V, C> {
    pub fn new(id: AgentId, deps: WorkerDeps<S, V, C>) -> Self {
        Self { id, deps }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Claim and process one item. `Ok(None)` means the backlog had
    /// nothing claimable.
    pub async fn run_once(&self, shutdown: watch::Receiver<bool>) -> Result<Option<WorkReport>> {
        let Some(item) = self.claim_next()? else {
            self.deps.agents.write_status(&self.id, AgentStatus::Idle)?;
            let idle = HookContext::new(HookEvent::SessionIdle, ".")
                .with_meta("agent_id", &self.id);
            let _ = self.deps.hooks.fire(&idle).await;
            return Ok(None);
        };
        tracing::info!(agent = %self.id, item = %item.id, "work assigned");
        self.deps
            .agents
            .write_status(&self.id, AgentStatus::Working)?;

        let report = match self.process(&item, shutdown).await {
            Ok(report) => report,
            Err(e) => {
                // Processing errors fail the item rather than wedging it.
                if self.still_owner(&item) {
                    self.deps.queue.fail(&item.id, &e.to_string())?;
                }
                self.deps.agents.write_status(&self.id, AgentStatus::Idle)?;
                return Err(e);
            }
        };

        self.deps.agents.write_status(&self.id, AgentStatus::Idle)?;
        Ok(Some(report))
    }

    /// Iterate the sorted backlog, attempting each claim in order.
    fn claim_next(&self) -> Result<Option<WorkItem>> {
        for item in self.deps.queue.list_available()? {
            match self.deps.queue.claim(&item.id, &self.id)? {
                ClaimOutcome::Claimed => return Ok(Some(item)),
                ClaimOutcome::AlreadyClaimed => continue,
            }
        }
        Ok(None)
    }

    async fn process(
        &self,
        item: &WorkItem,
        shutdown: watch::Receiver<bool>,
    ) -> Result<WorkReport> {
        let workspace = self
            .deps
            .workspaces
            .create(&self.id, self.deps.clock.utc_now().date_naive())
            .await?;

        let assigned = HookContext::new(HookEvent::WorkAssigned, &workspace.path)
            .with_meta("agent_id", &self.id)
            .with_meta("item_id", &item.id)
            .with_meta("title", &item.title);
        let _ = self.deps.hooks.fire(&assigned).await;

        let prompt_path = self.write_prompt(item, &workspace.path)?;
        let cmd = format!(
            "{} \"$(cat {})\"",
            self.deps.agent_cmd,
            shell_quote(&prompt_path.display().to_string())
        );

        let session_id = self
            .deps
            .sessions
            .start(&self.id, &workspace.path, &cmd, Some(item.id.clone()))
            .await?;

        // Tail the stream log the agent writes inside its workspace.
        let log_path = workspace.path.join(".gaffer-stream.jsonl");
        let (event_tx, event_rx) = mpsc::channel(64);
        let watcher = StreamWatcher::start(
            WatcherConfig {
                agent_id: self.id.clone(),
                session_id: session_id.to_string(),
                log_path,
            },
            self.deps.session_adapter.clone(),
            event_tx,
        );

        let monitor = SessionMonitor::new(
            self.id.clone(),
            self.deps.agents.clone(),
            self.deps.clock.clone(),
            self.deps.monitor_cfg.clone(),
        );
        let outcome = monitor.run(event_rx, shutdown).await?;
        watcher.stop();

        match outcome {
            MonitorOutcome::Dead => {
                // Normal end: the agent exited when its work was done.
                self.deps.sessions.stop(&self.id, true).await?;
                if !self.still_owner(item) {
                    return Ok(WorkReport::Released {
                        item: item.id.clone(),
                    });
                }
                self.deps.queue.complete(&item.id)?;
                Ok(WorkReport::Completed {
                    item: item.id.clone(),
                })
            }
            MonitorOutcome::Stalled => {
                self.deps.sessions.archive_forensics(&self.id).await?;
                self.deps.sessions.stop(&self.id, true).await?;
                if !self.still_owner(item) {
                    return Ok(WorkReport::Released {
                        item: item.id.clone(),
                    });
                }
                self.deps.queue.fail(&item.id, "stalled")?;
                Ok(WorkReport::Failed {
                    item: item.id.clone(),
                    reason: "stalled".to_string(),
                })
            }
            MonitorOutcome::TimedOut => {
                self.deps.sessions.archive_forensics(&self.id).await?;
                self.deps.sessions.stop(&self.id, true).await?;
                if !self.still_owner(item) {
                    return Ok(WorkReport::Released {
                        item: item.id.clone(),
                    });
                }
                self.deps.queue.fail(&item.id, "timeout")?;
                Ok(WorkReport::Failed {
                    item: item.id.clone(),
                    reason: "timeout".to_string(),
                })
            }
            MonitorOutcome::Cancelled => {
                // Shutdown: put the item back for another agent.
                self.deps.sessions.stop(&self.id, true).await?;
                self.deps.queue.release(&item.id)?;
                Ok(WorkReport::Released {
                    item: item.id.clone(),
                })
            }
        }
    }

    /// The health monitor may have reclaimed this claim while the session
    /// stalled; only the current owner may record an outcome.
    fn still_owner(&self, item: &WorkItem) -> bool {
        self.deps.queue.claim_owner(&item.id).as_ref() == Some(&self.id)
    }

    /// Write the bootstrap prompt the agent reads on startup.
    fn write_prompt(&self, item: &WorkItem, workspace: &std::path::Path) -> Result<std::path::PathBuf> {
        let path = workspace.join(".gaffer-prompt.md");
        let mut prompt = format!("# {}\n\n", item.title);
        prompt.push_str(&format!("Work item: {} ({})\n", item.id, item.kind));
        if let Some(rig) = &item.rig {
            prompt.push_str(&format!("Rig: {}\n", rig));
        }
        for (key, value) in &item.metadata {
            prompt.push_str(&format!("{}: {}\n", key, value));
        }
        std::fs::write(&path, &prompt)
            .map_err(|e| gaffer_core::error::io_error("worker.IO", &path, e))?;
        Ok(path)
    }
}

/// Escape characters with special meaning inside shell double quotes.
///
/// Backslash, backtick, dollar, and double quote are escaped so embedded
/// prompt paths and text pass through literally.
pub fn shell_quote(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '`' => result.push_str("\\`"),
            '$' => result.push_str("\\$"),
            '"' => result.push_str("\\\""),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
