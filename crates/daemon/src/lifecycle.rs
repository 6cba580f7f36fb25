// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator lifecycle: pid lock, crash detection, startup recovery.
//!
//! The pid file under `coordinator/` is held with an exclusive advisory
//! lock for the coordinator's whole life. A pid file whose lock is free
//! and whose PID is dead means the previous coordinator crashed; startup
//! then sweeps dead agents and releases orphaned claims before the pool
//! comes up.

use chrono::Duration as ChronoDuration;
use fs2::FileExt;
use gaffer_core::{AgentId, AgentStatus};
use gaffer_storage::{pid_alive, AgentStateStore, RootLayout, WorkQueue};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Errors during coordinator startup and shutdown.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no usable state root (set GAFFER_ROOT or HOME)")]
    NoStateRoot,
    #[error("another coordinator is already running (pid file locked)")]
    AlreadyRunning,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unrecoverable state inconsistency: {0}")]
    Inconsistent(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held coordinator pid file. The advisory lock lives as long as this
/// value; dropping it releases the lock but leaves the file in place.
#[derive(Debug)]
pub struct PidLock {
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Acquire the coordinator pid lock, detecting a crashed predecessor.
    ///
    /// Returns the lock plus whether the previous coordinator crashed
    /// (pid file present, lock free, recorded PID dead).
    pub fn acquire(layout: &RootLayout) -> Result<(Self, bool), LifecycleError> {
        let path = layout.coordinator_pid_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LifecycleError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let previous_pid: Option<u32> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse().ok());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LifecycleError::Io {
                path: path.clone(),
                source: e,
            })?;

        if FileExt::try_lock_exclusive(&file).is_err() {
            return Err(LifecycleError::AlreadyRunning);
        }

        let crashed = match previous_pid {
            Some(pid) => !pid_alive(pid),
            None => false,
        };

        let mut f = &file;
        let _ = f.set_len(0);
        let _ = f.seek(SeekFrom::Start(0));
        write!(f, "{}", std::process::id()).map_err(|e| LifecycleError::Io {
            path: path.clone(),
            source: e,
        })?;
        let _ = f.flush();

        Ok((Self { file, path }, crashed))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// What startup recovery did.
#[derive(Debug, Default, Clone)]
pub struct RecoveryReport {
    pub dead_agents: Vec<AgentId>,
    pub reclaimed_items: Vec<gaffer_core::ItemId>,
}

/// Sweep agents whose process died and release their claims.
///
/// Idempotent: running it twice finds nothing new the second time.
pub fn recover(
    agents: &AgentStateStore,
    queue: &WorkQueue,
) -> Result<RecoveryReport, LifecycleError> {
    let mut report = RecoveryReport::default();

    for agent in agents.list_agents().map_err(inconsistent)? {
        let alive = agents.read_pid(&agent).map(pid_alive).unwrap_or(false);
        if alive {
            continue;
        }
        info!(agent = %agent, "marking dead agent from previous run");
        agents
            .write_status(&agent, AgentStatus::Dead)
            .map_err(inconsistent)?;
        report.dead_agents.push(agent);
    }

    // Claims whose owner is not alive are released regardless of age on
    // crash recovery; the zero max-age makes every dead-owner claim stale.
    let reclaimed = queue
        .reclaim_stale(ChronoDuration::zero(), |owner| {
            let alive = agents.read_pid(owner).map(pid_alive).unwrap_or(false);
            if !alive {
                warn!(owner = %owner, "releasing claim held by dead agent");
            }
            alive
        })
        .map_err(inconsistent)?;
    report.reclaimed_items = reclaimed;
    Ok(report)
}

fn inconsistent(e: gaffer_core::Error) -> LifecycleError {
    LifecycleError::Inconsistent(e.to_string())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
