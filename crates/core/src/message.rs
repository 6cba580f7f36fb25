// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message and queued-message records.

use crate::item::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a message.
    pub struct MessageId;
}

/// How a message reaches its recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Mailbox append plus a notice injected into the recipient's session.
    Interrupt,
    /// Mailbox append only.
    #[default]
    Queue,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Interrupt => write!(f, "interrupt"),
            Delivery::Queue => write!(f, "queue"),
        }
    }
}

/// Message lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Open,
    Delivered,
    Failed,
}

/// A message addressed to an agent, queue, or channel.
///
/// Exactly one of `to`, `queue`, `channel` must be set; the router rejects
/// anything else as `mail.InvalidRouting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: Some(to.into()),
            queue: None,
            channel: None,
            subject: subject.into(),
            body: body.into(),
            priority: Priority::Normal,
            delivery: Delivery::Queue,
            status: MessageStatus::Open,
            thread_id: None,
            reply_to: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Count of routing fields set; valid routing has exactly one.
    pub fn routing_count(&self) -> usize {
        [
            self.to.is_some(),
            self.queue.is_some(),
            self.channel.is_some(),
        ]
        .iter()
        .filter(|&&set| set)
        .count()
    }
}

/// Envelope for a message in one of the orchestrator queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub message: Message,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl QueuedMessage {
    pub fn new(message: Message, queued_at: DateTime<Utc>) -> Self {
        Self {
            message,
            attempts: 0,
            last_attempt: None,
            queued_at,
            error: None,
        }
    }

    /// Dequeue ordering: numeric priority descending, then older
    /// `queued_at` first. Used with a stable sort so equal keys keep
    /// their arrival order.
    pub fn dequeue_order(&self, other: &Self) -> Ordering {
        other
            .message
            .priority
            .cmp(&self.message.priority)
            .then(self.queued_at.cmp(&other.queued_at))
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
