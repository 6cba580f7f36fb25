// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event-stream adapter.
//!
//! The agent process emits line-delimited JSON records on its stdout log.
//! [`stream`] parses them incrementally by byte offset; [`watcher`] tails
//! the log in the background and forwards typed batches plus session
//! liveness over a channel.

pub mod stream;
pub mod watcher;

pub use stream::{parse_records_from, StreamEvent, StreamRecord, TokenUsage};
pub use watcher::{StreamWatcher, WatchEvent, WatcherConfig};
