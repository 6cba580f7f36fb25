// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gaffer-adapters: Boundaries to the outside world.
//!
//! Everything the core consumes from outside (terminal multiplexer,
//! version control, the issue database, the agent's event stream)
//! enters through the typed adapters here. Each adapter keeps its own
//! small error enum; callers wrap failures into the structured error at
//! the component boundary.

pub mod agent;
pub mod issue;
pub mod session;
pub mod subprocess;
pub mod vcs;

pub use agent::{StreamEvent, StreamRecord, StreamWatcher, TokenUsage, WatchEvent, WatcherConfig};
pub use issue::{IssueDbAdapter, IssueDbError};
pub use session::{SessionAdapter, SessionError, TmuxAdapter};
pub use vcs::{GitCli, VcsAdapter, VcsError, VcsStatus};

#[cfg(any(test, feature = "test-support"))]
pub use issue::FakeIssueDb;
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeSessionAdapter, SessionCall};
#[cfg(any(test, feature = "test-support"))]
pub use vcs::FakeVcs;
