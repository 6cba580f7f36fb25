// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake session adapter for testing

use super::{SessionAdapter, SessionError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded session call
#[derive(Debug, Clone)]
pub enum SessionCall {
    NewSession {
        name: String,
        cwd: PathBuf,
        cmd: String,
        env: Vec<(String, String)>,
    },
    HasSession {
        id: String,
    },
    KillSession {
        id: String,
    },
    SendKeys {
        id: String,
        input: String,
    },
    SendLiteral {
        id: String,
        text: String,
    },
    SendEnter {
        id: String,
    },
    Capture {
        id: String,
        lines: u32,
    },
}

#[derive(Debug, Clone)]
struct FakeSession {
    alive: bool,
    pane_pid: Option<u32>,
    output: String,
    injected: Vec<String>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, FakeSession>,
    calls: Vec<SessionCall>,
    fail_spawn: bool,
    fail_send: bool,
    spawn_dead: bool,
}

/// In-memory session adapter recording every call.
#[derive(Clone, Default)]
pub struct FakeSessionAdapter {
    state: Arc<Mutex<State>>,
}

impl FakeSessionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made against this adapter, in order.
    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().calls.clone()
    }

    /// Text injected into `id` via send_keys/send_literal.
    pub fn injected(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .sessions
            .get(id)
            .map(|s| s.injected.clone())
            .unwrap_or_default()
    }

    /// Pre-set the captured pane output for `id`.
    pub fn set_output(&self, id: &str, output: &str) {
        if let Some(session) = self.state.lock().sessions.get_mut(id) {
            session.output = output.to_string();
        }
    }

    /// Mark a session dead without removing it (simulates a crash).
    pub fn mark_dead(&self, id: &str) {
        if let Some(session) = self.state.lock().sessions.get_mut(id) {
            session.alive = false;
            session.pane_pid = None;
        }
    }

    /// Make every subsequent spawn fail.
    pub fn fail_spawns(&self) {
        self.state.lock().fail_spawn = true;
    }

    /// Spawn sessions that die immediately (simulates startup crashes).
    pub fn spawn_dead_sessions(&self) {
        self.state.lock().spawn_dead = true;
    }

    /// Make every subsequent send fail (simulates delivery failure).
    pub fn fail_sends(&self) {
        self.state.lock().fail_send = true;
    }

    pub fn is_alive(&self, id: &str) -> bool {
        self.state
            .lock()
            .sessions
            .get(id)
            .map(|s| s.alive)
            .unwrap_or(false)
    }
}

#[async_trait]
impl SessionAdapter for FakeSessionAdapter {
    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<String, SessionError> {
        let id = format!("gaffer-{}", name);
        let mut state = self.state.lock();
        state.calls.push(SessionCall::NewSession {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            cmd: cmd.to_string(),
            env: env.to_vec(),
        });
        if state.fail_spawn {
            return Err(SessionError::SpawnFailed("scripted spawn failure".into()));
        }
        if state.sessions.get(&id).map(|s| s.alive).unwrap_or(false) {
            return Err(SessionError::AlreadyRunning(id));
        }
        let alive = !state.spawn_dead;
        let session_count = state.sessions.len();
        state.sessions.insert(
            id.clone(),
            FakeSession {
                alive,
                pane_pid: alive.then(|| 10_000 + session_count as u32),
                output: String::new(),
                injected: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn has_session(&self, id: &str) -> Result<bool, SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::HasSession { id: id.to_string() });
        Ok(state.sessions.get(id).map(|s| s.alive).unwrap_or(false))
    }

    async fn kill_session(&self, id: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::KillSession { id: id.to_string() });
        if let Some(session) = state.sessions.get_mut(id) {
            session.alive = false;
            session.pane_pid = None;
        }
        Ok(())
    }

    async fn send_keys(&self, id: &str, input: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::SendKeys {
            id: id.to_string(),
            input: input.to_string(),
        });
        if state.fail_send {
            return Err(SessionError::CommandFailed("scripted send failure".into()));
        }
        match state.sessions.get_mut(id) {
            Some(session) if session.alive => {
                session.injected.push(input.to_string());
                Ok(())
            }
            _ => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn send_literal(&self, id: &str, text: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::SendLiteral {
            id: id.to_string(),
            text: text.to_string(),
        });
        if state.fail_send {
            return Err(SessionError::CommandFailed("scripted send failure".into()));
        }
        match state.sessions.get_mut(id) {
            Some(session) if session.alive => {
                session.injected.push(text.to_string());
                Ok(())
            }
            _ => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn send_enter(&self, id: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::SendEnter { id: id.to_string() });
        if state.fail_send {
            return Err(SessionError::CommandFailed("scripted send failure".into()));
        }
        match state.sessions.get(id) {
            Some(session) if session.alive => Ok(()),
            _ => Err(SessionError::NotFound(id.to_string())),
        }
    }

    async fn capture(&self, id: &str, lines: u32) -> Result<String, SessionError> {
        let mut state = self.state.lock();
        state.calls.push(SessionCall::Capture {
            id: id.to_string(),
            lines,
        });
        state
            .sessions
            .get(id)
            .map(|s| s.output.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn pane_pid(&self, id: &str) -> Result<Option<u32>, SessionError> {
        Ok(self.state.lock().sessions.get(id).and_then(|s| s.pane_pid))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
