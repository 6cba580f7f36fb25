// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gaffer-storage: Persistent state under a single root directory.
//!
//! Every shared file is serialized through the cross-process lock in
//! [`lock`] and written with the tmp + fsync + rename discipline in
//! [`atomic`], so readers observe either the previous or the next version
//! of a file, never a partial write.

pub mod agent_state;
pub mod atomic;
pub mod layout;
pub mod lock;
pub mod mailbox;
pub mod orch_store;
pub mod process;
pub mod queue;

pub use agent_state::{AgentMetrics, AgentStateStore, ApiUsage, SessionMeta, SessionMetrics};
pub use layout::RootLayout;
pub use lock::{LockGuard, LockManager, LockMode};
pub use mailbox::MailboxStore;
pub use orch_store::{OrchQueueKind, OrchQueueStore};
pub use process::pid_alive;
pub use queue::{ClaimOutcome, QueueStats, WorkQueue};
