// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authoritative filesystem layout under the state root.
//!
//! All components resolve paths through this type so the on-disk tree
//! stays bit-compatible with other processes sharing the root.

use gaffer_core::{AgentId, ItemId};
use std::path::{Path, PathBuf};

/// Path builder for the state root.
#[derive(Debug, Clone)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue_file(&self) -> PathBuf {
        self.root.join("queue.json")
    }

    pub fn claims_dir(&self) -> PathBuf {
        self.root.join("claims")
    }

    pub fn claim_file(&self, item: &ItemId) -> PathBuf {
        self.claims_dir().join(format!("{}.claim", item))
    }

    pub fn claim_owner_file(&self, item: &ItemId) -> PathBuf {
        self.claims_dir().join(format!("{}.claim.owner", item))
    }

    pub fn claim_timestamp_file(&self, item: &ItemId) -> PathBuf {
        self.claims_dir().join(format!("{}.claim.timestamp", item))
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_dir(&self, agent: &AgentId) -> PathBuf {
        self.agents_dir().join(agent.as_str())
    }

    pub fn agent_marker(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("marker")
    }

    pub fn agent_pid_file(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("pid")
    }

    pub fn agent_heartbeat_file(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("heartbeat")
    }

    pub fn agent_status_file(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("status.json")
    }

    pub fn agent_session_file(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("session.json")
    }

    pub fn agent_metrics_file(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("metrics.json")
    }

    pub fn agent_logs_dir(&self, agent: &AgentId) -> PathBuf {
        self.agent_dir(agent).join("logs")
    }

    pub fn orchestrator_dir(&self) -> PathBuf {
        self.root.join("orchestrator")
    }

    pub fn inbound_file(&self) -> PathBuf {
        self.orchestrator_dir().join("inbound.json")
    }

    pub fn outbound_file(&self) -> PathBuf {
        self.orchestrator_dir().join("outbound.json")
    }

    pub fn dead_letter_file(&self) -> PathBuf {
        self.orchestrator_dir().join("dead-letter.json")
    }

    pub fn mailboxes_dir(&self) -> PathBuf {
        self.root.join("mailboxes")
    }

    /// Mailbox directory for a concrete address. `rig/name` addresses nest
    /// naturally as subdirectories.
    pub fn mailbox_dir(&self, address: &str) -> PathBuf {
        self.mailboxes_dir().join(address)
    }

    pub fn mailbox_inbox(&self, address: &str) -> PathBuf {
        self.mailbox_dir(address).join("inbox.jsonl")
    }

    pub fn mailbox_index(&self, address: &str) -> PathBuf {
        self.mailbox_dir(address).join("index")
    }

    pub fn coordinator_dir(&self) -> PathBuf {
        self.root.join("coordinator")
    }

    pub fn coordinator_pid_file(&self) -> PathBuf {
        self.coordinator_dir().join("coordinator.pid")
    }

    pub fn aggregate_status_file(&self) -> PathBuf {
        self.coordinator_dir().join("aggregate-status.json")
    }

    pub fn audit_file(&self) -> PathBuf {
        self.coordinator_dir().join("audit.jsonl")
    }

    pub fn hooks_file(&self) -> PathBuf {
        self.root.join("hooks.json")
    }

    pub fn alt_hooks_file(&self) -> PathBuf {
        self.root.join("alt-hooks.json")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(".locks")
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
