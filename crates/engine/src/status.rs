// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate status snapshot.
//!
//! Assembles `coordinator/aggregate-status.json` from the queue, the
//! per-agent state files, and coordinator identity. The snapshot is a
//! read-only observability surface; the files it reads stay
//! authoritative.

use chrono::{DateTime, Utc};
use gaffer_core::{AgentId, AgentStatus, Clock, HealthState, ItemId, ItemStatus, Result};
use gaffer_storage::{pid_alive, AgentStateStore, RootLayout, WorkQueue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `coordinator` block of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorBlock {
    pub pid: u32,
    pub uptime_seconds: u64,
}

/// One `agents[]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub id: AgentId,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<u64>,
    pub health: HealthState,
}

/// `work_queue` block of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkQueueBlock {
    pub total: usize,
    pub available: usize,
    pub claimed: usize,
    pub completed_today: usize,
    pub failed_today: usize,
    pub parked: usize,
}

/// `metrics` block of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsBlock {
    pub agents_active: usize,
    pub agents_working: usize,
    pub agents_idle: usize,
    pub throughput_per_hour: f64,
    pub success_rate: f64,
    pub average_work_duration: f64,
}

/// The whole snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub timestamp: DateTime<Utc>,
    pub coordinator: CoordinatorBlock,
    pub agents: Vec<AgentEntry>,
    pub work_queue: WorkQueueBlock,
    pub metrics: MetricsBlock,
}

/// Builds and persists aggregate status snapshots.
pub struct StatusBuilder<C> {
    layout: RootLayout,
    queue: WorkQueue,
    agents: AgentStateStore,
    clock: C,
    heartbeat_timeout: Duration,
}

impl<C: Clock> StatusBuilder<C> {
    pub fn new(
        layout: RootLayout,
        queue: WorkQueue,
        agents: AgentStateStore,
        clock: C,
        heartbeat_timeout: Duration,
    ) -> Self {
        Self {
            layout,
            queue,
            agents,
            clock,
            heartbeat_timeout,
        }
    }

    /// Health verdict for one agent from its pid and heartbeat files.
    pub fn health(&self, agent: &AgentId) -> HealthState {
        let Some(pid) = self.agents.read_pid(agent) else {
            return HealthState::Dead;
        };
        if !pid_alive(pid) {
            return HealthState::Dead;
        }
        let now = self.clock.epoch_secs();
        match self.agents.read_heartbeat(agent) {
            Some(beat) if now.saturating_sub(beat) <= self.heartbeat_timeout.as_secs() => {
                HealthState::Healthy
            }
            _ => HealthState::Stalled,
        }
    }

    /// Assemble the snapshot.
    pub fn build(&self, coordinator_pid: u32, uptime: Duration) -> Result<AggregateStatus> {
        let stats = self.queue.stats()?;
        let items = self.queue.list_all()?;

        let mut agents = Vec::new();
        for id in self.agents.list_agents()? {
            let status_file = self.agents.read_status(&id)?;
            let meta = self.agents.read_session_meta(&id)?;
            agents.push(AgentEntry {
                health: self.health(&id),
                status: status_file
                    .map(|s| s.status)
                    .unwrap_or(AgentStatus::Initializing),
                pid: self.agents.read_pid(&id),
                work_item: meta.as_ref().and_then(|m| m.work_item.clone()),
                started_at: meta.map(|m| m.started_at),
                last_heartbeat: self.agents.read_heartbeat(&id),
                id,
            });
        }

        let agents_working = agents
            .iter()
            .filter(|a| a.status == AgentStatus::Working)
            .count();
        let agents_idle = agents
            .iter()
            .filter(|a| a.status == AgentStatus::Idle)
            .count();
        let agents_active = agents
            .iter()
            .filter(|a| a.health == HealthState::Healthy)
            .count();

        let uptime_hours = (uptime.as_secs_f64() / 3600.0).max(1.0 / 60.0);
        let throughput_per_hour = stats.completed_today as f64 / uptime_hours;
        let finished_today = stats.completed_today + stats.failed_today;
        let success_rate = if finished_today == 0 {
            1.0
        } else {
            stats.completed_today as f64 / finished_today as f64
        };

        let durations: Vec<f64> = items
            .iter()
            .filter(|i| {
                matches!(i.status, ItemStatus::Completed | ItemStatus::Failed)
            })
            .filter_map(|i| i.metadata.get("duration_secs"))
            .filter_map(|d| d.parse::<f64>().ok())
            .collect();
        let average_work_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        Ok(AggregateStatus {
            timestamp: self.clock.utc_now(),
            coordinator: CoordinatorBlock {
                pid: coordinator_pid,
                uptime_seconds: uptime.as_secs(),
            },
            agents,
            work_queue: WorkQueueBlock {
                total: stats.total,
                available: stats.available,
                claimed: stats.claimed,
                completed_today: stats.completed_today,
                failed_today: stats.failed_today,
                parked: stats.parked,
            },
            metrics: MetricsBlock {
                agents_active,
                agents_working,
                agents_idle,
                throughput_per_hour,
                success_rate,
                average_work_duration,
            },
        })
    }

    /// Build and persist the snapshot atomically.
    pub fn write(&self, coordinator_pid: u32, uptime: Duration) -> Result<AggregateStatus> {
        let status = self.build(coordinator_pid, uptime)?;
        let path = self.layout.aggregate_status_file();
        gaffer_storage::atomic::write_json(&path, &status)
            .map_err(|e| gaffer_core::error::io_error("status.IO", &path, e))?;
        Ok(status)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
