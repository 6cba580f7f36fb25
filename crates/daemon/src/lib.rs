// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gaffer coordinator library.
//!
//! Exposes lifecycle and coordination types so integration tests and
//! supervisory tooling can drive the coordinator in-process; the
//! `gafferd` binary is a thin wrapper over these.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod coordinator;
pub mod env;
pub mod inject;
pub mod lifecycle;

pub use coordinator::{Coordinator, CoordinatorDeps};
pub use inject::PoolInjector;
pub use lifecycle::{LifecycleError, PidLock, RecoveryReport};
