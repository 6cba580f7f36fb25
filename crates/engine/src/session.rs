// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: start, stop, inspect, inject.
//!
//! Start and stop bracket the multiplexer calls with pre/post hooks.
//! Pre-hooks may block the operation (unless forced); post-hooks are
//! best-effort. Session metadata lands in `agents/<id>/session.json`
//! so other processes can see what is running.

use crate::hooks::{HookContext, HookEngine, HookEvent};
use gaffer_adapters::{SessionAdapter, SessionError};
use gaffer_core::{AgentId, Clock, Error, ItemId, Result, SessionName, SessionState};
use gaffer_storage::{AgentStateStore, SessionMeta};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait between liveness probes during startup.
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Grace period between Ctrl-C and kill on stop.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Pane lines captured for forensics.
const FORENSIC_CAPTURE_LINES: u32 = 200;

/// Current view of one agent's session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub state: SessionState,
    pub meta: Option<SessionMeta>,
}

/// Manages the one session each agent owns.
#[derive(Clone)]
pub struct SessionManager<S, C> {
    sessions: S,
    agents: AgentStateStore,
    hooks: Arc<HookEngine>,
    clock: C,
    startup_wait: Duration,
}

impl<S: SessionAdapter, C: Clock> SessionManager<S, C> {
    pub fn new(
        sessions: S,
        agents: AgentStateStore,
        hooks: Arc<HookEngine>,
        clock: C,
        startup_wait: Duration,
    ) -> Self {
        Self {
            sessions,
            agents,
            hooks,
            clock,
            startup_wait,
        }
    }

    /// Deterministic session name for an agent and role.
    pub fn session_name(agent: &AgentId, role: &str) -> SessionName {
        SessionName::new(format!("{}-{}", agent, role))
    }

    /// Start the agent process in a fresh session.
    ///
    /// Fires `pre-session-start` (blocking honored), creates the session,
    /// waits up to the startup bound for the agent to appear running,
    /// records `session.json`, then fires `post-session-start` best-effort.
    pub async fn start(
        &self,
        agent: &AgentId,
        workspace: &Path,
        agent_cmd: &str,
        work_item: Option<ItemId>,
    ) -> Result<SessionName> {
        self.agents.ensure_agent(agent)?;
        let name = Self::session_name(agent, "worker");

        let pre = HookContext::new(HookEvent::PreSessionStart, workspace)
            .with_meta("agent_id", agent)
            .with_meta("workspace", workspace.display())
            .with_meta("session_id", &name);
        let fired = self.hooks.fire(&pre).await;
        if fired.blocked {
            return Err(hook_blocked(fired.block_message, "session start"));
        }

        let env = [("GAFFER_AGENT_ID".to_string(), agent.to_string())];
        let session_id = self
            .sessions
            .new_session(name.as_str(), workspace, agent_cmd, &env)
            .await
            .map_err(|e| wrap_session("session.Start", e))?;

        if let Err(e) = self.wait_for_running(agent, &session_id).await {
            return Err(e);
        }

        let pid = self
            .sessions
            .pane_pid(&session_id)
            .await
            .map_err(|e| wrap_session("session.Start", e))?;
        let meta = SessionMeta {
            pid,
            session_id: SessionName::new(&session_id),
            started_at: self.clock.utc_now(),
            work_item,
            workspace: workspace.to_path_buf(),
            command: agent_cmd.to_string(),
        };
        self.agents.write_session_meta(agent, &meta)?;
        if let Some(pid) = pid {
            self.agents.write_pid(agent, pid)?;
        }
        self.agents
            .touch_heartbeat(agent, self.clock.epoch_secs())?;

        let post = HookContext::new(HookEvent::PostSessionStart, workspace)
            .with_meta("agent_id", agent)
            .with_meta("session_id", &session_id);
        let _ = self.hooks.fire(&post).await;

        tracing::info!(agent = %agent, session_id, "session started");
        Ok(SessionName::new(session_id))
    }

    /// Stop the agent's session.
    ///
    /// `pre-shutdown` hooks run first; a block fails the stop unless
    /// `force` is set (the hook still runs, its verdict is logged but not
    /// honored). Kill is graceful-then-forced.
    pub async fn stop(&self, agent: &AgentId, force: bool) -> Result<()> {
        let Some(meta) = self.agents.read_session_meta(agent)? else {
            return Ok(());
        };
        let session_id = meta.session_id.as_str();

        let pre = HookContext::new(HookEvent::PreShutdown, meta.workspace.clone())
            .with_meta("agent_id", agent)
            .with_meta("session_id", session_id);
        let fired = self.hooks.fire(&pre).await;
        if fired.blocked {
            if force {
                tracing::warn!(
                    agent = %agent,
                    message = fired.block_message.as_deref().unwrap_or(""),
                    "pre-shutdown block overridden by force"
                );
            } else {
                return Err(hook_blocked(fired.block_message, "session stop"));
            }
        }

        // Graceful interrupt, then kill.
        let _ = self.sessions.send_keys(session_id, "C-c").await;
        tokio::time::sleep(STOP_GRACE).await;
        self.sessions
            .kill_session(session_id)
            .await
            .map_err(|e| wrap_session("session.Stop", e))?;

        self.agents.clear_session_meta(agent)?;

        let post = HookContext::new(HookEvent::PostShutdown, meta.workspace.clone())
            .with_meta("agent_id", agent)
            .with_meta("session_id", session_id);
        let _ = self.hooks.fire(&post).await;

        tracing::info!(agent = %agent, session_id, "session stopped");
        Ok(())
    }

    /// Current state plus recorded metadata.
    pub async fn status(&self, agent: &AgentId) -> Result<SessionInfo> {
        let meta = self.agents.read_session_meta(agent)?;
        let state = match &meta {
            None => SessionState::Absent,
            Some(meta) => {
                let alive = self
                    .sessions
                    .has_session(meta.session_id.as_str())
                    .await
                    .map_err(|e| wrap_session("session.Status", e))?;
                if alive {
                    SessionState::Running
                } else {
                    SessionState::Dead
                }
            }
        };
        Ok(SessionInfo { state, meta })
    }

    /// Accumulated pane output. Observers get the capture via the
    /// `on-pane-output` hook, best-effort.
    pub async fn capture(&self, agent: &AgentId) -> Result<String> {
        let meta = self.require_meta(agent)?;
        let output = self
            .sessions
            .capture(meta.session_id.as_str(), FORENSIC_CAPTURE_LINES)
            .await
            .map_err(|e| wrap_session("session.Capture", e))?;

        let observed = HookContext::new(HookEvent::OnPaneOutput, meta.workspace.clone())
            .with_meta("agent_id", agent)
            .with_meta("session_id", &meta.session_id)
            .with_meta("lines", output.lines().count());
        let _ = self.hooks.fire(&observed).await;

        Ok(output)
    }

    /// Deliver text into the agent's session as if typed.
    pub async fn inject(&self, agent: &AgentId, text: &str) -> Result<()> {
        let meta = self.require_meta(agent)?;
        let session_id = meta.session_id.as_str();
        self.sessions
            .send_literal(session_id, text)
            .await
            .map_err(inject_failed)?;
        self.sessions
            .send_enter(session_id)
            .await
            .map_err(inject_failed)?;
        Ok(())
    }

    /// Capture pane output and archive it for post-mortem before the
    /// session disappears.
    pub async fn archive_forensics(&self, agent: &AgentId) -> Result<()> {
        let Some(meta) = self.agents.read_session_meta(agent)? else {
            return Ok(());
        };
        let pane = self
            .sessions
            .capture(meta.session_id.as_str(), FORENSIC_CAPTURE_LINES)
            .await
            .unwrap_or_default();
        self.agents
            .archive_forensics(agent, &[("pane.txt", pane.as_bytes())])
    }

    async fn wait_for_running(&self, agent: &AgentId, session_id: &str) -> Result<()> {
        let deadline = self.clock.now() + self.startup_wait;
        loop {
            match self.sessions.has_session(session_id).await {
                Ok(true) => {
                    if self
                        .sessions
                        .pane_pid(session_id)
                        .await
                        .map_err(|e| wrap_session("session.Start", e))?
                        .is_some()
                    {
                        return Ok(());
                    }
                }
                Ok(false) => {
                    // Died during startup: preserve what it printed.
                    let pane = self
                        .sessions
                        .capture(session_id, FORENSIC_CAPTURE_LINES)
                        .await
                        .unwrap_or_default();
                    let _ = self
                        .agents
                        .archive_forensics(agent, &[("startup-pane.txt", pane.as_bytes())]);
                    return Err(Error::permanent(
                        "session.StartupFailed",
                        "session died during startup",
                    )
                    .with_context("agent", agent)
                    .with_context("session_id", session_id)
                    .with_hint("check the startup-pane capture under the agent's logs"));
                }
                Err(e) => return Err(wrap_session("session.Start", e)),
            }

            if self.clock.now() >= deadline {
                return Err(Error::permanent(
                    "session.StartupFailed",
                    format!(
                        "agent did not reach running within {}s",
                        self.startup_wait.as_secs()
                    ),
                )
                .with_context("agent", agent)
                .with_context("session_id", session_id));
            }
            tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
        }
    }

    fn require_meta(&self, agent: &AgentId) -> Result<SessionMeta> {
        self.agents.read_session_meta(agent)?.ok_or_else(|| {
            Error::permanent("session.NotRunning", "agent has no recorded session")
                .with_context("agent", agent)
        })
    }
}

fn hook_blocked(message: Option<String>, operation: &str) -> Error {
    let detail = message.unwrap_or_else(|| "a pre-hook signaled block".to_string());
    Error::user("hook.Blocked", format!("{} blocked by hook", operation))
        .with_context("blocker", detail.clone())
        .with_hint(detail)
}

fn wrap_session(code: &str, e: SessionError) -> Error {
    match e {
        SessionError::AlreadyRunning(id) => {
            Error::user("session.AlreadyRunning", "a live session with this name exists")
                .with_context("session_id", id)
                .with_hint("stop the existing session first")
        }
        SessionError::NotFound(id) => {
            Error::permanent("session.NotFound", "no such session").with_context("session_id", id)
        }
        SessionError::SpawnFailed(msg) => Error::permanent(code, msg),
        SessionError::CommandFailed(msg) => Error::transient(code, msg),
    }
}

fn inject_failed(e: SessionError) -> Error {
    Error::transient("session.InjectFailed", e.to_string())
        .with_hint("recipient session may be down; delivery will be retried")
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
