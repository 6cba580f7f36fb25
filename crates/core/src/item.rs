// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work item types and backlog ordering.

use crate::agent_record::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a work item, opaque and stable per backlog.
    pub struct ItemId;
}

/// Work item priority. Ordering: urgent > high > normal > low.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// Status of a work item through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Claimed,
    Completed,
    Failed,
    Parked,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Available => write!(f, "available"),
            ItemStatus::Claimed => write!(f, "claimed"),
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Failed => write!(f, "failed"),
            ItemStatus::Parked => write!(f, "parked"),
        }
    }
}

/// A unit of work claimable by exactly one agent at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub priority: Priority,
    /// Routing hint naming the target repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rig: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimant: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub enqueued_at: DateTime<Utc>,
    /// Set when the item reaches completed, failed, or parked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Consecutive failures; items park once this exceeds the retry budget.
    #[serde(default)]
    pub failure_count: u32,
}

impl WorkItem {
    pub fn new(id: impl Into<ItemId>, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            priority: Priority::Normal,
            rig: None,
            title: title.into(),
            metadata: HashMap::new(),
            status: ItemStatus::Available,
            claimant: None,
            claimed_at: None,
            enqueued_at: Utc::now(),
            finished_at: None,
            failure_count: 0,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_rig(mut self, rig: impl Into<String>) -> Self {
        self.rig = Some(rig.into());
        self
    }

    /// Ordering agents use when iterating the available backlog:
    /// priority descending, enqueue time ascending, item ID as tie-break.
    pub fn claim_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(self.enqueued_at.cmp(&other.enqueued_at))
            .then(self.id.cmp(&other.id))
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
