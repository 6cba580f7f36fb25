// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backlog intake from the issue database.
//!
//! Pulls ready issues into the work queue and reports item outcomes back.
//! Adapter queries are Transient-classified and retried on the database
//! profile before surfacing.

use gaffer_adapters::{IssueDbAdapter, IssueDbError};
use gaffer_core::retry::{with_retry, RetryConfig};
use gaffer_core::{Error, ItemId, Result, WorkItem};
use gaffer_storage::WorkQueue;
use std::collections::HashMap;

/// Syncs the work queue with the backing issue database.
pub struct WorkIntake<I> {
    db: I,
    queue: WorkQueue,
    retry: RetryConfig,
}

impl<I: IssueDbAdapter> WorkIntake<I> {
    pub fn new(db: I, queue: WorkQueue, retry: RetryConfig) -> Self {
        Self { db, queue, retry }
    }

    /// Pull ready issues into the queue. Items already enqueued are
    /// skipped; returns the IDs actually added.
    pub async fn pull_ready(&self) -> Result<Vec<ItemId>> {
        let ready = with_retry(&self.retry, || async {
            self.db.list_ready().await.map_err(wrap_db)
        })
        .await?;

        let known: Vec<ItemId> = self
            .queue
            .list_all()?
            .into_iter()
            .map(|i| i.id)
            .collect();

        let mut added = Vec::new();
        for item in ready {
            if known.contains(&item.id) {
                continue;
            }
            let id = item.id.clone();
            self.queue.push(WorkItem {
                // Items arrive from the adapter already shaped; only the
                // queue-owned lifecycle fields are reset.
                status: gaffer_core::ItemStatus::Available,
                claimant: None,
                claimed_at: None,
                finished_at: None,
                ..item
            })?;
            added.push(id);
        }
        if !added.is_empty() {
            tracing::info!(count = added.len(), "pulled ready issues into the queue");
        }
        Ok(added)
    }

    /// Report an item outcome back to the issue database and sync.
    pub async fn report_outcome(&self, item: &ItemId, status: &str) -> Result<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.to_string());
        with_retry(&self.retry, || {
            let fields = fields.clone();
            async move { self.db.update(item, fields).await.map_err(wrap_db) }
        })
        .await?;
        with_retry(&self.retry, || async {
            self.db.sync().await.map_err(wrap_db)
        })
        .await
    }
}

fn wrap_db(e: IssueDbError) -> Error {
    match e {
        IssueDbError::NotFound(id) => {
            Error::permanent("adapter.IssueNotFound", "no such issue").with_context("issue", id)
        }
        IssueDbError::Query(msg) => Error::transient("adapter.Query", msg)
            .with_hint("the issue database may be briefly unavailable"),
        IssueDbError::Sync(msg) => Error::transient("adapter.Sync", msg),
    }
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
