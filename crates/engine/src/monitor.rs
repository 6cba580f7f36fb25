// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session monitoring.
//!
//! Consumes the stream watcher's typed events, keeps the per-agent
//! heartbeat, counters, and token totals current, and decides when a
//! session is dead, stalled, or out of wall-clock budget.

use gaffer_adapters::{StreamEvent, WatchEvent};
use gaffer_core::{AgentId, Clock, Result};
use gaffer_storage::AgentStateStore;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Monitor tuning, split from the global config for testability.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Evaluation cadence.
    pub poll_interval: Duration,
    /// No-heartbeat window before the session counts as stalled.
    pub stall_threshold: Duration,
    /// Wall-clock cap on the whole session.
    pub session_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            stall_threshold: Duration::from_secs(300),
            session_timeout: Duration::from_secs(3600),
        }
    }
}

/// Why the monitor returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Session ended (agent process exited or session killed).
    Dead,
    /// No heartbeat within the stall threshold.
    Stalled,
    /// Session exceeded its wall-clock budget.
    TimedOut,
    /// Shutdown signal observed.
    Cancelled,
}

/// Drives one agent's observability from its event stream.
pub struct SessionMonitor<C> {
    agent: AgentId,
    agents: AgentStateStore,
    clock: C,
    cfg: MonitorConfig,
}

impl<C: Clock> SessionMonitor<C> {
    pub fn new(agent: AgentId, agents: AgentStateStore, clock: C, cfg: MonitorConfig) -> Self {
        Self {
            agent,
            agents,
            clock,
            cfg,
        }
    }

    /// Run until the session dies, stalls, times out, or shutdown flips.
    ///
    /// `events` is the stream watcher's channel. Heartbeat updates on any
    /// observed activity; counters and token totals update per record.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<MonitorOutcome> {
        let started = self.clock.now();
        self.agents
            .touch_heartbeat(&self.agent, self.clock.epoch_secs())?;
        let mut last_activity = self.clock.now();
        let mut interval = tokio::time::interval(self.cfg.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender reads as shutdown too.
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(MonitorOutcome::Cancelled);
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(WatchEvent::Records(records)) => {
                            last_activity = self.clock.now();
                            self.agents
                                .touch_heartbeat(&self.agent, self.clock.epoch_secs())?;
                            self.apply_records(&records)?;
                        }
                        Some(WatchEvent::SessionGone) | None => {
                            return Ok(MonitorOutcome::Dead);
                        }
                    }
                }
                _ = interval.tick() => {
                    let now = self.clock.now();
                    if now.duration_since(started) >= self.cfg.session_timeout {
                        tracing::warn!(agent = %self.agent, "session exceeded wall-clock budget");
                        return Ok(MonitorOutcome::TimedOut);
                    }
                    if now.duration_since(last_activity) >= self.cfg.stall_threshold {
                        tracing::warn!(agent = %self.agent, "session stalled");
                        return Ok(MonitorOutcome::Stalled);
                    }
                }
            }
        }
    }

    fn apply_records(&self, records: &[gaffer_adapters::StreamRecord]) -> Result<()> {
        let mut messages = 0u64;
        let mut tools: Vec<String> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut usage_deltas: Vec<gaffer_adapters::TokenUsage> = Vec::new();

        for record in records {
            match &record.event {
                StreamEvent::MessageStop => messages += 1,
                StreamEvent::ToolUse { name } => {
                    tools.push(name.clone().unwrap_or_else(|| "unknown".to_string()));
                }
                StreamEvent::Error { message } => {
                    errors.push(message.clone().unwrap_or_else(|| "unknown error".to_string()));
                }
                StreamEvent::MessageDelta { usage: Some(usage) } => {
                    usage_deltas.push(usage.clone());
                }
                _ => {}
            }
        }

        if messages > 0 || !tools.is_empty() || !errors.is_empty() || !usage_deltas.is_empty() {
            self.agents.update_metrics(&self.agent, |metrics| {
                metrics.session_metrics.messages += messages;
                metrics.session_metrics.tool_invocations += tools.len() as u64;
                metrics.session_metrics.errors += errors.len() as u64;
                for tool in &tools {
                    *metrics.tool_usage.entry(tool.clone()).or_insert(0) += 1;
                }
                for usage in &usage_deltas {
                    metrics.api_usage.input_tokens += usage.input_tokens;
                    metrics.api_usage.output_tokens += usage.output_tokens;
                    metrics.api_usage.cache_creation_input_tokens +=
                        usage.cache_creation_input_tokens;
                    metrics.api_usage.cache_read_input_tokens += usage.cache_read_input_tokens;
                }
            })?;
        }

        for error in &errors {
            self.agents.append_error_log(&self.agent, error)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
