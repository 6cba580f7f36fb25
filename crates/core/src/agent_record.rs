// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity, status, and the per-agent state record.

use crate::item::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

crate::define_id! {
    /// Stable agent identifier (e.g. `agent-1`).
    pub struct AgentId;
}

/// Agent lifecycle status as recorded in `agents/<id>/status.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Initializing,
    Idle,
    Working,
    Interrupted,
    Dead,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Initializing => write!(f, "initializing"),
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Interrupted => write!(f, "interrupted"),
            AgentStatus::Dead => write!(f, "dead"),
        }
    }
}

/// Health verdict from the coordinator's monitor pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Process alive and heartbeat fresh.
    Healthy,
    /// Process alive but heartbeat stale; needs forced teardown before
    /// its claim is reclaimed.
    Stalled,
    /// Process gone.
    Dead,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Stalled => write!(f, "stalled"),
            HealthState::Dead => write!(f, "dead"),
        }
    }
}

/// Aggregated view of one agent, assembled from its state files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Consecutive failure counter; replacement stops at the configured cap.
    #[serde(default)]
    pub failures: u32,
}

impl AgentRecord {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            status: AgentStatus::Initializing,
            pid: None,
            work_item: None,
            workspace: None,
            started_at: None,
            last_heartbeat: None,
            failures: 0,
        }
    }
}

#[cfg(test)]
#[path = "agent_record_tests.rs"]
mod tests;
