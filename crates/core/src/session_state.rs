// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity and the session state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Terminal-multiplexer session name, deterministic from agent + role.
    pub struct SessionName;
}

/// Session lifecycle state.
///
/// Normal path: absent → starting → running → stopping → absent.
/// Any state may jump to dead on crash detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Absent,
    Starting,
    Running,
    Stopping,
    Dead,
}

impl SessionState {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Dead) => true,
            (Absent, Starting) => true,
            (Starting, Running) => true,
            (Running, Stopping) => true,
            (Stopping, Absent) => true,
            (Dead, Absent) => true,
            _ => false,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Absent => write!(f, "absent"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Dead => write!(f, "dead"),
        }
    }
}

#[cfg(test)]
#[path = "session_state_tests.rs"]
mod tests;
