// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent observability files under `agents/<id>/`.
//!
//! The pid and heartbeat files are single-value text files the health
//! monitor can read without JSON parsing; status, session, and metrics
//! files are JSON written atomically.

use crate::atomic::{read_json, write_json};
use crate::layout::RootLayout;
use chrono::{DateTime, Utc};
use gaffer_core::error::io_error;
use gaffer_core::{AgentId, AgentStatus, ItemId, Result, SessionName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Shape of `agents/<id>/status.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFile {
    pub status: AgentStatus,
    pub updated_at: DateTime<Utc>,
}

/// Shape of `agents/<id>/session.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub session_id: SessionName,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item: Option<ItemId>,
    /// Workspace the session runs in; hooks execute here.
    pub workspace: std::path::PathBuf,
    pub command: String,
}

/// Token usage totals from the agent's event stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

/// Progress counters from the event stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub messages: u64,
    pub tool_invocations: u64,
    pub errors: u64,
}

/// Shape of `agents/<id>/metrics.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub api_usage: ApiUsage,
    pub tool_usage: BTreeMap<String, u64>,
    pub session_metrics: SessionMetrics,
}

/// Accessor for one root's `agents/` tree.
#[derive(Debug, Clone)]
pub struct AgentStateStore {
    layout: RootLayout,
}

impl AgentStateStore {
    pub fn new(layout: RootLayout) -> Self {
        Self { layout }
    }

    /// Create the agent directory, marker, and logs dir.
    pub fn ensure_agent(&self, agent: &AgentId) -> Result<()> {
        let logs = self.layout.agent_logs_dir(agent);
        fs::create_dir_all(&logs).map_err(|e| io_error("agent.IO", &logs, e))?;
        let marker = self.layout.agent_marker(agent);
        match fs::OpenOptions::new().create_new(true).write(true).open(&marker) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(io_error("agent.IO", &marker, e)),
        }
    }

    /// Agent IDs present under `agents/`.
    pub fn list_agents(&self) -> Result<Vec<AgentId>> {
        let dir = self.layout.agents_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("agent.IO", &dir, e)),
        };
        let mut agents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("agent.IO", &dir, e))?;
            if entry.path().is_dir() {
                agents.push(AgentId::new(entry.file_name().to_string_lossy()));
            }
        }
        agents.sort();
        Ok(agents)
    }

    pub fn write_pid(&self, agent: &AgentId, pid: u32) -> Result<()> {
        let path = self.layout.agent_pid_file(agent);
        fs::write(&path, pid.to_string()).map_err(|e| io_error("agent.IO", &path, e))
    }

    pub fn read_pid(&self, agent: &AgentId) -> Option<u32> {
        fs::read_to_string(self.layout.agent_pid_file(agent))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Record liveness as integer epoch seconds.
    pub fn touch_heartbeat(&self, agent: &AgentId, epoch_secs: u64) -> Result<()> {
        let path = self.layout.agent_heartbeat_file(agent);
        fs::write(&path, epoch_secs.to_string()).map_err(|e| io_error("agent.IO", &path, e))
    }

    pub fn read_heartbeat(&self, agent: &AgentId) -> Option<u64> {
        fs::read_to_string(self.layout.agent_heartbeat_file(agent))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn write_status(&self, agent: &AgentId, status: AgentStatus) -> Result<()> {
        let path = self.layout.agent_status_file(agent);
        let file = StatusFile {
            status,
            updated_at: Utc::now(),
        };
        write_json(&path, &file).map_err(|e| io_error("agent.IO", &path, e))
    }

    pub fn read_status(&self, agent: &AgentId) -> Result<Option<StatusFile>> {
        let path = self.layout.agent_status_file(agent);
        read_json(&path).map_err(|e| io_error("agent.IO", &path, e))
    }

    pub fn write_session_meta(&self, agent: &AgentId, meta: &SessionMeta) -> Result<()> {
        let path = self.layout.agent_session_file(agent);
        write_json(&path, meta).map_err(|e| io_error("agent.IO", &path, e))
    }

    pub fn read_session_meta(&self, agent: &AgentId) -> Result<Option<SessionMeta>> {
        let path = self.layout.agent_session_file(agent);
        read_json(&path).map_err(|e| io_error("agent.IO", &path, e))
    }

    pub fn clear_session_meta(&self, agent: &AgentId) -> Result<()> {
        let path = self.layout.agent_session_file(agent);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("agent.IO", &path, e)),
        }
    }

    pub fn read_metrics(&self, agent: &AgentId) -> Result<AgentMetrics> {
        let path = self.layout.agent_metrics_file(agent);
        Ok(read_json(&path)
            .map_err(|e| io_error("agent.IO", &path, e))?
            .unwrap_or_default())
    }

    /// Read-modify-write the metrics file.
    pub fn update_metrics(
        &self,
        agent: &AgentId,
        f: impl FnOnce(&mut AgentMetrics),
    ) -> Result<()> {
        let path = self.layout.agent_metrics_file(agent);
        let mut metrics: AgentMetrics = read_json(&path)
            .map_err(|e| io_error("agent.IO", &path, e))?
            .unwrap_or_default();
        f(&mut metrics);
        write_json(&path, &metrics).map_err(|e| io_error("agent.IO", &path, e))
    }

    /// Append one line to the per-agent error log.
    pub fn append_error_log(&self, agent: &AgentId, line: &str) -> Result<()> {
        use std::io::Write;
        let path = self.layout.agent_logs_dir(agent).join("errors.log");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("agent.IO", parent, e))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error("agent.IO", &path, e))?;
        writeln!(file, "{}", line).map_err(|e| io_error("agent.IO", &path, e))
    }

    /// Archive files into `agents/<id>/logs/forensics-<ts>/` for post-mortem.
    pub fn archive_forensics(&self, agent: &AgentId, files: &[(&str, &[u8])]) -> Result<()> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let dir = self
            .layout
            .agent_logs_dir(agent)
            .join(format!("forensics-{}", stamp));
        fs::create_dir_all(&dir).map_err(|e| io_error("agent.IO", &dir, e))?;
        for (name, bytes) in files {
            let path = dir.join(name);
            fs::write(&path, bytes).map_err(|e| io_error("agent.IO", &path, e))?;
        }
        Ok(())
    }

    /// Remove the whole agent directory. Idempotent.
    pub fn remove_agent(&self, agent: &AgentId) -> Result<()> {
        let dir = self.layout.agent_dir(agent);
        remove_dir_if_present(&dir)
    }
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("agent.IO", dir, e)),
    }
}

#[cfg(test)]
#[path = "agent_state_tests.rs"]
mod tests;
