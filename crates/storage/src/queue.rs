// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue with the atomic hard-link claim protocol.
//!
//! `queue.json` is the backlog record; the hard link under `claims/` is the
//! sole source of truth for ownership. Claiming is a single `link(2)` call
//! from the agent's marker file: success claims, `EEXIST` means someone got
//! there first. There is no check-then-act window.

use crate::atomic::{read_json, write_json};
use crate::layout::RootLayout;
use crate::lock::LockManager;
use chrono::{DateTime, SecondsFormat, Utc};
use gaffer_core::error::io_error;
use gaffer_core::{AgentId, Error, ItemId, ItemStatus, Result, WorkItem};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// On-disk shape of `queue.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueFile {
    version: u64,
    items: Vec<WorkItem>,
}

/// Result of a claim attempt. `AlreadyClaimed` is an expected outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyClaimed,
}

/// Counts for the aggregate status snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub available: usize,
    pub claimed: usize,
    pub completed_today: usize,
    pub failed_today: usize,
    pub parked: usize,
}

/// Audit entry appended when a stale claim is reclaimed or an item parked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub item: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The authoritative backlog.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    layout: RootLayout,
    locks: LockManager,
}

impl WorkQueue {
    pub fn new(layout: RootLayout, locks: LockManager) -> Self {
        Self { layout, locks }
    }

    /// Add an item to the backlog.
    pub fn push(&self, item: WorkItem) -> Result<()> {
        self.update_queue(|file| {
            if file.items.iter().any(|i| i.id == item.id) {
                return Err(Error::user("queue.InvalidState", "item already enqueued")
                    .with_context("item", &item.id));
            }
            file.items.push(item.clone());
            Ok(())
        })
    }

    /// All items, in stored order.
    pub fn list_all(&self) -> Result<Vec<WorkItem>> {
        Ok(self.read_queue()?.items)
    }

    /// Fetch one item.
    pub fn get(&self, item: &ItemId) -> Result<WorkItem> {
        self.read_queue()?
            .items
            .into_iter()
            .find(|i| &i.id == item)
            .ok_or_else(|| item_not_found(item))
    }

    /// Available items ordered by priority desc, enqueue time asc, ID asc.
    pub fn list_available(&self) -> Result<Vec<WorkItem>> {
        let mut items: Vec<WorkItem> = self
            .read_queue()?
            .items
            .into_iter()
            .filter(|i| i.status == ItemStatus::Available)
            .collect();
        items.sort_by(|a, b| a.claim_order(b));
        Ok(items)
    }

    /// Attempt to claim `item` for `agent`.
    ///
    /// The hard link from the agent marker to `claims/<item>.claim` is the
    /// decision point. If the subsequent `queue.json` update fails, the
    /// link is removed so the claim never outlives its record.
    pub fn claim(&self, item: &ItemId, agent: &AgentId) -> Result<ClaimOutcome> {
        let marker = self.layout.agent_marker(agent);
        ensure_marker(&marker)?;

        let claim_path = self.layout.claim_file(item);
        if let Some(parent) = claim_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("queue.IO", parent, e))?;
        }

        match fs::hard_link(&marker, &claim_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }
            Err(e) => return Err(io_error("queue.Claim", &claim_path, e)),
        }

        let now = Utc::now();
        if let Err(e) = self.write_claim_sidecars(item, agent, now) {
            self.remove_claim_files(item);
            return Err(e);
        }

        let updated = self.update_queue(|file| {
            let record = find_item(file, item)?;
            if record.status != ItemStatus::Available {
                return Err(Error::user("queue.InvalidState", "item is not claimable")
                    .with_context("item", item)
                    .with_context("status", record.status));
            }
            record.status = ItemStatus::Claimed;
            record.claimant = Some(agent.clone());
            record.claimed_at = Some(now);
            Ok(())
        });

        if let Err(e) = updated {
            // Roll the link back so the claim invariant holds.
            self.remove_claim_files(item);
            return Err(e);
        }

        tracing::info!(item = %item, agent = %agent, "claimed");
        Ok(ClaimOutcome::Claimed)
    }

    /// Return a claimed item to the backlog. Idempotent.
    pub fn release(&self, item: &ItemId) -> Result<()> {
        self.remove_claim_files(item);
        self.update_queue(|file| {
            if let Ok(record) = find_item(file, item) {
                if record.status == ItemStatus::Claimed {
                    record.status = ItemStatus::Available;
                }
                record.claimant = None;
                record.claimed_at = None;
            }
            Ok(())
        })
    }

    /// Mark a claimed item completed and drop its claim.
    pub fn complete(&self, item: &ItemId) -> Result<()> {
        self.remove_claim_files(item);
        self.finish(item, ItemStatus::Completed, None)
    }

    /// Mark a claimed item failed and drop its claim.
    pub fn fail(&self, item: &ItemId, reason: &str) -> Result<()> {
        self.remove_claim_files(item);
        self.finish(item, ItemStatus::Failed, Some(reason))
    }

    /// Park an item that exhausted its retry budget.
    pub fn park(&self, item: &ItemId, reason: &str) -> Result<()> {
        self.remove_claim_files(item);
        self.finish(item, ItemStatus::Parked, Some(reason))?;
        self.append_audit(AuditRecord {
            timestamp: Utc::now(),
            action: "park".to_string(),
            item: item.clone(),
            agent: None,
            detail: Some(reason.to_string()),
        })
    }

    /// Release every claim older than `max_age` whose owner fails the
    /// `owner_alive` probe. Returns the reclaimed item IDs.
    pub fn reclaim_stale(
        &self,
        max_age: chrono::Duration,
        owner_alive: impl Fn(&AgentId) -> bool,
    ) -> Result<Vec<ItemId>> {
        let claims_dir = self.layout.claims_dir();
        let entries = match fs::read_dir(&claims_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("queue.IO", &claims_dir, e)),
        };

        let now = Utc::now();
        let mut reclaimed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("queue.IO", &claims_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(item_id) = name.strip_suffix(".claim") else {
                continue;
            };
            let item = ItemId::new(item_id);

            let claimed_at = self.read_claim_timestamp(&item);
            let Some(claimed_at) = claimed_at else {
                continue;
            };
            if now.signed_duration_since(claimed_at) <= max_age {
                continue;
            }

            let owner = self.read_claim_owner(&item);
            if owner.as_ref().is_some_and(&owner_alive) {
                continue;
            }

            tracing::warn!(item = %item, owner = ?owner, "reclaiming stale claim");
            self.release(&item)?;
            self.append_audit(AuditRecord {
                timestamp: now,
                action: "reclaim".to_string(),
                item: item.clone(),
                agent: owner,
                detail: Some(format!("claim older than {}s", max_age.num_seconds())),
            })?;
            reclaimed.push(item);
        }
        Ok(reclaimed)
    }

    /// Owner recorded beside a claim, if present.
    pub fn claim_owner(&self, item: &ItemId) -> Option<AgentId> {
        self.read_claim_owner(item)
    }

    /// Item IDs currently claimed by `agent`.
    pub fn claims_owned_by(&self, agent: &AgentId) -> Result<Vec<ItemId>> {
        let claims_dir = self.layout.claims_dir();
        let entries = match fs::read_dir(&claims_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("queue.IO", &claims_dir, e)),
        };
        let mut owned = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("queue.IO", &claims_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(item_id) = name.strip_suffix(".claim") else {
                continue;
            };
            let item = ItemId::new(item_id);
            if self.read_claim_owner(&item).as_ref() == Some(agent) {
                owned.push(item);
            }
        }
        owned.sort();
        Ok(owned)
    }

    /// Whether a live claim exists for `item`.
    pub fn is_claimed(&self, item: &ItemId) -> bool {
        self.layout.claim_file(item).exists()
    }

    /// Counts for the aggregate status snapshot.
    pub fn stats(&self) -> Result<QueueStats> {
        let items = self.read_queue()?.items;
        let today = Utc::now().date_naive();
        let finished_today = |i: &WorkItem| {
            i.finished_at
                .map(|t| t.date_naive() == today)
                .unwrap_or(false)
        };

        let mut stats = QueueStats {
            total: items.len(),
            ..QueueStats::default()
        };
        for item in &items {
            match item.status {
                ItemStatus::Available => stats.available += 1,
                ItemStatus::Claimed => stats.claimed += 1,
                ItemStatus::Completed if finished_today(item) => stats.completed_today += 1,
                ItemStatus::Failed if finished_today(item) => stats.failed_today += 1,
                ItemStatus::Parked => stats.parked += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    fn finish(&self, item: &ItemId, status: ItemStatus, reason: Option<&str>) -> Result<()> {
        self.update_queue(|file| {
            let record = find_item(file, item)?;
            let now = Utc::now();
            if let Some(claimed_at) = record.claimed_at {
                let secs = now.signed_duration_since(claimed_at).num_seconds().max(0);
                record
                    .metadata
                    .insert("duration_secs".to_string(), secs.to_string());
            }
            record.status = status;
            record.claimant = None;
            record.claimed_at = None;
            record.finished_at = Some(now);
            if status != ItemStatus::Completed {
                record.failure_count += 1;
            }
            if let Some(reason) = reason {
                record
                    .metadata
                    .insert("last_error".to_string(), reason.to_string());
            }
            Ok(())
        })
    }

    fn read_queue(&self) -> Result<QueueFile> {
        let path = self.layout.queue_file();
        self.locks.with_read_lock(&path, || {
            Ok(read_json::<QueueFile>(&path)
                .map_err(|e| io_error("queue.IO", &path, e))?
                .unwrap_or_default())
        })
    }

    fn update_queue(&self, f: impl FnOnce(&mut QueueFile) -> Result<()>) -> Result<()> {
        let path = self.layout.queue_file();
        self.locks.with_write_lock(&path, || {
            let mut file = read_json::<QueueFile>(&path)
                .map_err(|e| io_error("queue.IO", &path, e))?
                .unwrap_or_default();
            f(&mut file)?;
            file.version += 1;
            write_json(&path, &file).map_err(|e| io_error("queue.IO", &path, e))
        })
    }

    fn write_claim_sidecars(
        &self,
        item: &ItemId,
        agent: &AgentId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let owner_path = self.layout.claim_owner_file(item);
        fs::write(&owner_path, agent.as_str())
            .map_err(|e| io_error("queue.IO", &owner_path, e))?;
        let ts_path = self.layout.claim_timestamp_file(item);
        fs::write(&ts_path, at.to_rfc3339_opts(SecondsFormat::Secs, true))
            .map_err(|e| io_error("queue.IO", &ts_path, e))
    }

    fn remove_claim_files(&self, item: &ItemId) {
        for path in [
            self.layout.claim_file(item),
            self.layout.claim_owner_file(item),
            self.layout.claim_timestamp_file(item),
        ] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "claim cleanup failed");
                }
            }
        }
    }

    fn read_claim_owner(&self, item: &ItemId) -> Option<AgentId> {
        fs::read_to_string(self.layout.claim_owner_file(item))
            .ok()
            .map(|s| AgentId::new(s.trim()))
    }

    fn read_claim_timestamp(&self, item: &ItemId) -> Option<DateTime<Utc>> {
        let text = fs::read_to_string(self.layout.claim_timestamp_file(item)).ok()?;
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    fn append_audit(&self, record: AuditRecord) -> Result<()> {
        let path = self.layout.audit_file();
        self.locks.with_write_lock(&path, || {
            crate::atomic::append_jsonl(&path, &record)
                .map(|_| ())
                .map_err(|e| io_error("queue.IO", &path, e))
        })
    }
}

fn find_item<'a>(file: &'a mut QueueFile, item: &ItemId) -> Result<&'a mut WorkItem> {
    file.items
        .iter_mut()
        .find(|i| &i.id == item)
        .ok_or_else(|| item_not_found(item))
}

fn item_not_found(item: &ItemId) -> Error {
    Error::permanent("queue.ItemNotFound", "no such work item").with_context("item", item)
}

fn ensure_marker(marker: &Path) -> Result<()> {
    if marker.exists() {
        return Ok(());
    }
    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("queue.IO", parent, e))?;
    }
    match fs::OpenOptions::new().create_new(true).write(true).open(marker) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(io_error("queue.IO", marker, e)),
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
