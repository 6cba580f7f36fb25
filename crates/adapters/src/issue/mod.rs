// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue-database adapter.
//!
//! The backing issue store is opaque to the core; it only has to answer
//! three questions: what is ready, record field updates, and sync.

use async_trait::async_trait;
use gaffer_core::{ItemId, WorkItem};
use std::collections::HashMap;
use thiserror::Error;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeIssueDb;

/// Errors from issue-database operations
#[derive(Debug, Error)]
pub enum IssueDbError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("issue not found: {0}")]
    NotFound(String),
    #[error("sync failed: {0}")]
    Sync(String),
}

/// Adapter over the backing issue database.
#[async_trait]
pub trait IssueDbAdapter: Clone + Send + Sync + 'static {
    /// Work items ready to be enqueued.
    async fn list_ready(&self) -> Result<Vec<WorkItem>, IssueDbError>;

    /// Record field updates for one issue.
    async fn update(
        &self,
        id: &ItemId,
        fields: HashMap<String, String>,
    ) -> Result<(), IssueDbError>;

    /// Push local state to the backing store.
    async fn sync(&self) -> Result<(), IssueDbError>;
}
