// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-address mailbox storage.
//!
//! Each recipient owns a directory with an append-only `inbox.jsonl` and an
//! `index` file recording the tail offset and message count. Appends happen
//! under the exclusive lock as a single whole-line write; readers take the
//! shared lock and drop any unterminated trailing line.

use crate::atomic::{append_jsonl, read_json, read_jsonl, write_json};
use crate::layout::RootLayout;
use crate::lock::LockManager;
use gaffer_core::error::io_error;
use gaffer_core::{Error, Message, MessageId, MessageStatus, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Tail-offset index beside each inbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxIndex {
    pub tail_offset: u64,
    pub count: u64,
}

/// Mailbox storage rooted at `<root>/mailboxes/`.
#[derive(Debug, Clone)]
pub struct MailboxStore {
    layout: RootLayout,
    locks: LockManager,
}

impl MailboxStore {
    pub fn new(layout: RootLayout, locks: LockManager) -> Self {
        Self { layout, locks }
    }

    /// Append one message to `address`'s inbox. Exactly one append per
    /// successful call; a failed call appends nothing.
    pub fn append(&self, address: &str, message: &Message) -> Result<()> {
        let dir = self.layout.mailbox_dir(address);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::system("mailbox.DirCreate", e.to_string())
                .with_context("path", dir.display())
                .with_cause(e)
        })?;

        let inbox = self.layout.mailbox_inbox(address);
        let index_path = self.layout.mailbox_index(address);
        self.locks.with_write_lock(&inbox, || {
            let tail_offset =
                append_jsonl(&inbox, message).map_err(|e| io_error("mailbox.IO", &inbox, e))?;
            let mut index: MailboxIndex = read_json(&index_path)
                .map_err(|e| io_error("mailbox.IO", &index_path, e))?
                .unwrap_or_default();
            index.tail_offset = tail_offset;
            index.count += 1;
            write_json(&index_path, &index).map_err(|e| io_error("mailbox.IO", &index_path, e))
        })
    }

    /// Every message in `address`'s inbox, in append order.
    pub fn read_all(&self, address: &str) -> Result<Vec<Message>> {
        let inbox = self.layout.mailbox_inbox(address);
        self.locks.with_read_lock(&inbox, || {
            read_jsonl(&inbox).map_err(|e| io_error("mailbox.IO", &inbox, e))
        })
    }

    /// Messages matching an optional literal substring filter over
    /// subject, body, and sender. Wildcard characters in the filter are
    /// rejected; filters are literal.
    pub fn list(&self, address: &str, filter: Option<&str>) -> Result<Vec<Message>> {
        if let Some(pattern) = filter {
            if pattern.contains('*') || pattern.contains('?') {
                return Err(Error::user(
                    "mail.InvalidFilter",
                    "filters match literal substrings",
                )
                .with_context("filter", pattern)
                .with_hint("drop the wildcard; any message containing the text will match"));
            }
        }
        let messages = self.read_all(address)?;
        Ok(match filter {
            None => messages,
            Some(pattern) => messages
                .into_iter()
                .filter(|m| {
                    m.subject.contains(pattern)
                        || m.body.contains(pattern)
                        || m.from.contains(pattern)
                })
                .collect(),
        })
    }

    /// Find one message by ID in `address`'s inbox.
    pub fn show(&self, address: &str, id: &MessageId) -> Result<Message> {
        self.read_all(address)?
            .into_iter()
            .find(|m| &m.id == id)
            .ok_or_else(|| message_not_found(id))
    }

    /// Find one message by ID across every mailbox.
    pub fn find(&self, id: &MessageId) -> Result<(String, Message)> {
        for address in self.addresses()? {
            if let Some(found) = self
                .read_all(&address)?
                .into_iter()
                .find(|m| &m.id == id)
            {
                return Ok((address, found));
            }
        }
        Err(message_not_found(id))
    }

    /// Mark a message delivered-and-closed. Rewrites the inbox atomically
    /// under the exclusive lock; append-only applies to delivery, not to
    /// status flips.
    pub fn close(&self, address: &str, id: &MessageId) -> Result<()> {
        let inbox = self.layout.mailbox_inbox(address);
        self.locks.with_write_lock(&inbox, || {
            let mut messages: Vec<Message> =
                read_jsonl(&inbox).map_err(|e| io_error("mailbox.IO", &inbox, e))?;
            let found = messages.iter_mut().find(|m| &m.id == id);
            let Some(message) = found else {
                return Err(message_not_found(id));
            };
            message.status = MessageStatus::Delivered;

            let mut bytes = Vec::new();
            for m in &messages {
                let line = serde_json::to_vec(m)
                    .map_err(|e| io_error("mailbox.IO", &inbox, std::io::Error::other(e)))?;
                bytes.extend_from_slice(&line);
                bytes.push(b'\n');
            }
            crate::atomic::atomic_write(&inbox, &bytes)
                .map_err(|e| io_error("mailbox.IO", &inbox, e))
        })
    }

    /// Every known mailbox address (relative directory containing an inbox).
    pub fn addresses(&self) -> Result<Vec<String>> {
        let base = self.layout.mailboxes_dir();
        let mut found = Vec::new();
        collect_inboxes(&base, &base, &mut found)?;
        found.sort();
        Ok(found)
    }
}

fn collect_inboxes(
    base: &std::path::Path,
    dir: &std::path::Path,
    found: &mut Vec<String>,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io_error("mailbox.IO", dir, e)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| io_error("mailbox.IO", dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join("inbox.jsonl").exists() {
            if let Ok(rel) = path.strip_prefix(base) {
                found.push(rel.to_string_lossy().into_owned());
            }
        }
        collect_inboxes(base, &path, found)?;
    }
    Ok(())
}

fn message_not_found(id: &MessageId) -> Error {
    Error::permanent("mailbox.MessageNotFound", "no such message").with_context("message", id)
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
