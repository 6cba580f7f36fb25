// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background stream watcher using file notifications.
//!
//! A producer task tails the agent's stream log (notify events when the
//! platform supports them, interval polling otherwise) and forwards typed
//! record batches to the consumer. Session liveness is checked on every
//! poll; a dead session ends the watch with a final `SessionGone`.

use super::stream::{parse_records_from, StreamRecord};
use crate::session::SessionAdapter;
use gaffer_core::AgentId;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Fallback poll cadence when file notifications are unavailable, and the
/// liveness-check cadence always.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for one agent watch.
pub struct WatcherConfig {
    pub agent_id: AgentId,
    /// Full session ID for liveness checks.
    pub session_id: String,
    /// Path to the agent's stdout stream log.
    pub log_path: PathBuf,
}

/// What the watcher reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// New records appended to the stream log.
    Records(Vec<StreamRecord>),
    /// The session disappeared; the watch ends after this.
    SessionGone,
}

/// Handle to a running watch; dropping the handle stops it.
pub struct StreamWatcher {
    shutdown: Option<oneshot::Sender<()>>,
}

impl StreamWatcher {
    /// Start tailing. Events arrive on `event_tx` until shutdown or
    /// session death.
    pub fn start<S: SessionAdapter>(
        config: WatcherConfig,
        sessions: S,
        event_tx: mpsc::Sender<WatchEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(watch_loop(config, sessions, event_tx, shutdown_rx));
        Self {
            shutdown: Some(shutdown_tx),
        }
    }

    /// Stop the watch explicitly.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for StreamWatcher {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn watch_loop<S: SessionAdapter>(
    config: WatcherConfig,
    sessions: S,
    event_tx: mpsc::Sender<WatchEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let WatcherConfig {
        agent_id,
        session_id,
        log_path,
    } = config;

    // File watcher with polling fallback.
    let (file_tx, mut file_rx) = mpsc::channel::<()>(32);
    let _watcher_guard = match create_file_watcher(&log_path, file_tx) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(%agent_id, error = %e, "file watcher failed, using fallback polling");
            None
        }
    };

    let mut offset: u64 = 0;
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                tracing::debug!(%agent_id, "watcher shutdown");
                return;
            }
            _ = file_rx.recv() => {
                offset = drain_records(&log_path, offset, &event_tx).await;
            }
            _ = interval.tick() => {
                offset = drain_records(&log_path, offset, &event_tx).await;

                match sessions.has_session(&session_id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::info!(%agent_id, session_id, "session gone");
                        // Final drain so nothing written before death is lost.
                        let _ = drain_records(&log_path, offset, &event_tx).await;
                        let _ = event_tx.send(WatchEvent::SessionGone).await;
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(%agent_id, error = %e, "liveness check failed");
                    }
                }
            }
        }
    }
}

async fn drain_records(
    log_path: &std::path::Path,
    offset: u64,
    event_tx: &mpsc::Sender<WatchEvent>,
) -> u64 {
    let (records, next_offset) = parse_records_from(log_path, offset);
    if !records.is_empty() {
        let _ = event_tx.send(WatchEvent::Records(records)).await;
    }
    next_offset
}

fn create_file_watcher(
    path: &std::path::Path,
    tx: mpsc::Sender<()>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            // Non-blocking: a full channel means a drain is already queued.
            let _ = tx.try_send(());
        }
    })?;
    // Watch the parent so creation of the log file is observed too.
    let target = path.parent().unwrap_or(path);
    watcher.watch(target, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
