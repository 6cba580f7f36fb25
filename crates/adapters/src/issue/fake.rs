// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake issue database for testing

use super::{IssueDbAdapter, IssueDbError};
use async_trait::async_trait;
use gaffer_core::{ItemId, WorkItem};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct State {
    ready: Vec<WorkItem>,
    updates: Vec<(ItemId, HashMap<String, String>)>,
    syncs: u32,
    fail_queries: bool,
}

/// In-memory issue database.
#[derive(Clone, Default)]
pub struct FakeIssueDb {
    state: Arc<Mutex<State>>,
}

impl FakeIssueDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, items: Vec<WorkItem>) {
        self.state.lock().ready = items;
    }

    pub fn updates(&self) -> Vec<(ItemId, HashMap<String, String>)> {
        self.state.lock().updates.clone()
    }

    pub fn sync_count(&self) -> u32 {
        self.state.lock().syncs
    }

    /// Make every subsequent query fail (simulates backend outage).
    pub fn fail_queries(&self) {
        self.state.lock().fail_queries = true;
    }
}

#[async_trait]
impl IssueDbAdapter for FakeIssueDb {
    async fn list_ready(&self) -> Result<Vec<WorkItem>, IssueDbError> {
        let state = self.state.lock();
        if state.fail_queries {
            return Err(IssueDbError::Query("scripted outage".to_string()));
        }
        Ok(state.ready.clone())
    }

    async fn update(
        &self,
        id: &ItemId,
        fields: HashMap<String, String>,
    ) -> Result<(), IssueDbError> {
        let mut state = self.state.lock();
        if state.fail_queries {
            return Err(IssueDbError::Query("scripted outage".to_string()));
        }
        state.updates.push((id.clone(), fields));
        Ok(())
    }

    async fn sync(&self) -> Result<(), IssueDbError> {
        let mut state = self.state.lock();
        if state.fail_queries {
            return Err(IssueDbError::Sync("scripted outage".to_string()));
        }
        state.syncs += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
