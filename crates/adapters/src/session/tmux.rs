// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux session adapter

use super::{SessionAdapter, SessionError};
use crate::subprocess::{run_with_timeout, TMUX_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Tmux-based session adapter.
///
/// Session IDs carry a `gaffer-` prefix so stray sessions are easy to
/// spot and sweep.
#[derive(Clone, Default)]
pub struct TmuxAdapter;

impl TmuxAdapter {
    pub fn new() -> Self {
        Self
    }
}

async fn tmux(args: &[&str], description: &str) -> Result<std::process::Output, SessionError> {
    let mut cmd = Command::new("tmux");
    cmd.args(args);
    run_with_timeout(cmd, TMUX_TIMEOUT, description)
        .await
        .map_err(SessionError::CommandFailed)
}

#[async_trait]
impl SessionAdapter for TmuxAdapter {
    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<String, SessionError> {
        // Precondition: cwd must exist
        if !cwd.exists() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let session_id = format!("gaffer-{}", name);

        let existing = tmux(&["has-session", "-t", &session_id], "tmux has-session").await;
        if existing.map(|o| o.status.success()).unwrap_or(false) {
            return Err(SessionError::AlreadyRunning(session_id));
        }

        let mut tmux_cmd = Command::new("tmux");
        tmux_cmd
            .arg("new-session")
            .arg("-d")
            .arg("-s")
            .arg(&session_id)
            .arg("-c")
            .arg(cwd);

        for (key, value) in env {
            tmux_cmd.arg("-e").arg(format!("{}={}", key, value));
        }

        tmux_cmd.arg(cmd);

        let output = run_with_timeout(tmux_cmd, TMUX_TIMEOUT, "tmux new-session")
            .await
            .map_err(SessionError::SpawnFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(session_id, stderr = %stderr, "tmux spawn failed");
            return Err(SessionError::SpawnFailed(stderr.to_string()));
        }

        // Log stderr even on success - may contain useful warnings
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session_id, stderr = %stderr, "tmux spawn stderr (non-fatal)");
        }

        Ok(session_id)
    }

    async fn has_session(&self, id: &str) -> Result<bool, SessionError> {
        let output = tmux(&["has-session", "-t", id], "tmux has-session").await?;
        Ok(output.status.success())
    }

    async fn kill_session(&self, id: &str) -> Result<(), SessionError> {
        // A failed kill means the session is already gone, which is fine.
        let _ = tmux(&["kill-session", "-t", id], "tmux kill-session").await?;
        Ok(())
    }

    async fn send_keys(&self, id: &str, input: &str) -> Result<(), SessionError> {
        let output = tmux(&["send-keys", "-t", id, input], "tmux send-keys").await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn send_literal(&self, id: &str, text: &str) -> Result<(), SessionError> {
        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        let output = tmux(&["send-keys", "-t", id, "-l", "--", text], "tmux send-keys").await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn send_enter(&self, id: &str) -> Result<(), SessionError> {
        let output = tmux(&["send-keys", "-t", id, "Enter"], "tmux send-keys").await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn capture(&self, id: &str, lines: u32) -> Result<String, SessionError> {
        let from = format!("-{}", lines);
        let output = tmux(
            &["capture-pane", "-t", id, "-p", "-S", &from],
            "tmux capture-pane",
        )
        .await?;
        if !output.status.success() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn pane_pid(&self, id: &str) -> Result<Option<u32>, SessionError> {
        let output = tmux(
            &["list-panes", "-t", id, "-F", "#{pane_pid}"],
            "tmux list-panes",
        )
        .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.split_whitespace().next().and_then(|s| s.parse().ok()))
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
