// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-multiplexer session adapters

mod tmux;

pub use tmux::TmuxAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSessionAdapter, SessionCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session already running: {0}")]
    AlreadyRunning(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Adapter for managing terminal-multiplexer sessions.
///
/// `new_session` returns the full session ID (adapter prefix included);
/// every other operation takes that ID.
#[async_trait]
pub trait SessionAdapter: Clone + Send + Sync + 'static {
    /// Create a detached session running `cmd` in `cwd`.
    ///
    /// Fails with [`SessionError::AlreadyRunning`] if a live session with
    /// the same name exists.
    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<String, SessionError>;

    /// Check if a session is alive.
    async fn has_session(&self, id: &str) -> Result<bool, SessionError>;

    /// Kill a session. Killing an already-dead session is not an error.
    async fn kill_session(&self, id: &str) -> Result<(), SessionError>;

    /// Send input to a session with key-name interpretation.
    async fn send_keys(&self, id: &str, input: &str) -> Result<(), SessionError>;

    /// Send literal text to a session (no key interpretation).
    async fn send_literal(&self, id: &str, text: &str) -> Result<(), SessionError>;

    /// Send the Enter key to a session.
    async fn send_enter(&self, id: &str) -> Result<(), SessionError>;

    /// Capture the last `lines` lines of pane output.
    async fn capture(&self, id: &str, lines: u32) -> Result<String, SessionError>;

    /// PID of the session's pane process, if the session is alive.
    async fn pane_pid(&self, id: &str) -> Result<Option<u32>, SessionError>;
}
