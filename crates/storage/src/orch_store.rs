// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the three orchestrator queues.
//!
//! Each queue is one JSON array, serialized atomically under its own lock.
//! No two queue locks are ever held at once; callers load, mutate in
//! memory, and store one queue at a time.

use crate::atomic::{read_json, write_json};
use crate::layout::RootLayout;
use crate::lock::LockManager;
use gaffer_core::error::io_error;
use gaffer_core::{QueuedMessage, Result};
use std::path::PathBuf;

/// Which orchestrator queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchQueueKind {
    Inbound,
    Outbound,
    DeadLetter,
}

impl OrchQueueKind {
    fn path(self, layout: &RootLayout) -> PathBuf {
        match self {
            OrchQueueKind::Inbound => layout.inbound_file(),
            OrchQueueKind::Outbound => layout.outbound_file(),
            OrchQueueKind::DeadLetter => layout.dead_letter_file(),
        }
    }
}

/// Store for `orchestrator/{inbound,outbound,dead-letter}.json`.
#[derive(Debug, Clone)]
pub struct OrchQueueStore {
    layout: RootLayout,
    locks: LockManager,
}

impl OrchQueueStore {
    pub fn new(layout: RootLayout, locks: LockManager) -> Self {
        Self { layout, locks }
    }

    /// Load a queue; a missing file reads as empty.
    pub fn load(&self, kind: OrchQueueKind) -> Result<Vec<QueuedMessage>> {
        let path = kind.path(&self.layout);
        self.locks.with_read_lock(&path, || {
            Ok(read_json(&path)
                .map_err(|e| io_error("mailbox.IO", &path, e))?
                .unwrap_or_default())
        })
    }

    /// Persist a queue atomically.
    pub fn store(&self, kind: OrchQueueKind, messages: &[QueuedMessage]) -> Result<()> {
        let path = kind.path(&self.layout);
        self.locks.with_write_lock(&path, || {
            write_json(&path, &messages).map_err(|e| io_error("mailbox.IO", &path, e))
        })
    }

    /// Load, mutate, and store one queue under a single lock hold.
    pub fn update(
        &self,
        kind: OrchQueueKind,
        f: impl FnOnce(&mut Vec<QueuedMessage>),
    ) -> Result<Vec<QueuedMessage>> {
        let path = kind.path(&self.layout);
        self.locks.with_write_lock(&path, || {
            let mut messages: Vec<QueuedMessage> = read_json(&path)
                .map_err(|e| io_error("mailbox.IO", &path, e))?
                .unwrap_or_default();
            f(&mut messages);
            write_json(&path, &messages).map_err(|e| io_error("mailbox.IO", &path, e))?;
            Ok(messages)
        })
    }
}

#[cfg(test)]
#[path = "orch_store_tests.rs"]
mod tests;
