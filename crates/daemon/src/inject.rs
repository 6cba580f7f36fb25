// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interrupt-notice injection for the orchestrator.
//!
//! Maps a mailbox address back to the pool agent embodying it and types
//! the notice into that agent's session. Passed into the orchestrator as
//! a callback so the mail plane never depends on the session plane.

use gaffer_adapters::SessionAdapter;
use gaffer_core::{Clock, Error};
use gaffer_engine::{InjectFuture, RouterRegistry, SessionInjector, SessionManager};

/// Injector backed by the coordinator's session manager.
pub struct PoolInjector<S, C> {
    sessions: SessionManager<S, C>,
    registry: RouterRegistry,
}

impl<S, C> PoolInjector<S, C> {
    pub fn new(sessions: SessionManager<S, C>, registry: RouterRegistry) -> Self {
        Self { sessions, registry }
    }
}

impl<S: SessionAdapter, C: Clock> SessionInjector for PoolInjector<S, C> {
    fn inject<'a>(&'a self, recipient: &'a str, notice: &'a str) -> InjectFuture<'a> {
        Box::pin(async move {
            let agent = self
                .registry
                .agents
                .iter()
                .find(|a| a.address() == recipient)
                .and_then(|a| a.agent_id.clone());
            let Some(agent) = agent else {
                return Err(not_embodied(recipient));
            };
            self.sessions.inject(&agent, notice).await
        })
    }
}

fn not_embodied(recipient: &str) -> Error {
    Error::transient(
        "session.InjectFailed",
        "recipient has no live pool agent",
    )
    .with_context("recipient", recipient)
}

#[cfg(test)]
#[path = "inject_tests.rs"]
mod tests;
