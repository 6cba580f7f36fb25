// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background mail orchestrator.
//!
//! Three cooperative loops over three persistent queues:
//! inbound (pending delivery, priority-sorted), outbound (awaiting
//! retry), dead-letter (exhausted). Each queue has its own in-process
//! mutex plus its cross-process lock inside the store; no two queue
//! locks are ever held together. Interrupt delivery goes through an
//! injector callback rather than a session-manager dependency, keeping
//! the component graph acyclic.

use crate::router::Router;
use gaffer_core::config::OrchestratorConfig;
use gaffer_core::{Category, Clock, Delivery, Error, Message, QueuedMessage, Result};
use gaffer_storage::{OrchQueueKind, OrchQueueStore};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Pause when inbound is empty.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// Cadence of the outbound scan in the retry loop.
const RETRY_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Boxed future for the injector callback.
pub type InjectFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Delivers an interrupt notice into a recipient's session.
///
/// Implemented over the session manager by the daemon; the orchestrator
/// itself never touches sessions directly.
pub trait SessionInjector: Send + Sync + 'static {
    fn inject<'a>(&'a self, recipient: &'a str, notice: &'a str) -> InjectFuture<'a>;
}

/// Source of eligible messages for the inbound loop's periodic scan.
pub trait BacklogSource: Send + Sync + 'static {
    /// Messages that should be promoted to inbound (urgent/high priority
    /// or interrupt delivery).
    fn poll_eligible(&self) -> Result<Vec<Message>>;
}

/// Backlog source with nothing to contribute; submissions come through
/// [`MailOrchestrator::submit`] only.
pub struct NullBacklog;

impl BacklogSource for NullBacklog {
    fn poll_eligible(&self) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
}

/// Handle to the running loops.
pub struct OrchestratorHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Signal cancellation, wait for every loop to drain its current
    /// iteration, then return. Queue state is already persisted; every
    /// mutation writes through.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// The orchestrator itself. Cheap to clone behind an Arc.
pub struct MailOrchestrator<C> {
    store: OrchQueueStore,
    router: Arc<Router>,
    injector: Arc<dyn SessionInjector>,
    backlog: Arc<dyn BacklogSource>,
    clock: C,
    cfg: OrchestratorConfig,
    // One in-process mutex per queue; never two held at once.
    inbound_mutex: Mutex<()>,
    outbound_mutex: Mutex<()>,
    dead_letter_mutex: Mutex<()>,
}

impl<C: Clock> MailOrchestrator<C> {
    pub fn new(
        store: OrchQueueStore,
        router: Arc<Router>,
        injector: Arc<dyn SessionInjector>,
        backlog: Arc<dyn BacklogSource>,
        clock: C,
        cfg: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            router,
            injector,
            backlog,
            clock,
            cfg,
            inbound_mutex: Mutex::new(()),
            outbound_mutex: Mutex::new(()),
            dead_letter_mutex: Mutex::new(()),
        }
    }

    /// Queue a message for asynchronous delivery.
    pub fn submit(&self, message: Message) -> Result<()> {
        let queued = QueuedMessage::new(message, self.clock.utc_now());
        self.push_inbound(vec![queued])
    }

    /// Spawn the three loops. Startup with missing queue files is
    /// non-fatal; they read as empty.
    pub fn spawn(self: &Arc<Self>) -> OrchestratorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(loop_guard("inbound", {
                let orch = Arc::clone(self);
                let shutdown = shutdown_rx.clone();
                async move { orch.inbound_loop(shutdown).await }
            })),
            tokio::spawn(loop_guard("outbound", {
                let orch = Arc::clone(self);
                let shutdown = shutdown_rx.clone();
                async move { orch.outbound_loop(shutdown).await }
            })),
            tokio::spawn(loop_guard("retry", {
                let orch = Arc::clone(self);
                let shutdown = shutdown_rx;
                async move { orch.retry_loop(shutdown).await }
            })),
        ];
        OrchestratorHandle { shutdown_tx, tasks }
    }

    /// One pass of every loop body, for deterministic tests and the
    /// drain step during shutdown.
    pub async fn tick(&self) -> Result<()> {
        self.scan_backlog()?;
        while self.deliver_next().await?.is_some() {}
        self.requeue_due()?;
        Ok(())
    }

    async fn inbound_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let poll = Duration::from_secs(self.cfg.poll_interval.max(1));
        loop {
            if let Err(e) = self.scan_backlog() {
                tracing::warn!(error = %e, "backlog scan failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    async fn outbound_loop(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.deliver_next().await {
                Ok(Some(_)) => {} // keep draining
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_WAIT) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "delivery pass failed");
                    tokio::time::sleep(IDLE_WAIT).await;
                }
            }
        }
    }

    async fn retry_loop(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if let Err(e) = self.requeue_due() {
                tracing::warn!(error = %e, "retry scan failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(RETRY_SCAN_INTERVAL) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Promote eligible backlog messages into inbound.
    fn scan_backlog(&self) -> Result<()> {
        let eligible = self.backlog.poll_eligible()?;
        if eligible.is_empty() {
            return Ok(());
        }
        let now = self.clock.utc_now();
        let queued = eligible
            .into_iter()
            .map(|m| QueuedMessage::new(m, now))
            .collect();
        self.push_inbound(queued)
    }

    fn push_inbound(&self, mut incoming: Vec<QueuedMessage>) -> Result<()> {
        let _guard = self.inbound_mutex.lock();
        self.store.update(OrchQueueKind::Inbound, |queue| {
            incoming.retain(|new| {
                !queue
                    .iter()
                    .any(|existing| existing.message.id == new.message.id)
            });
            queue.append(&mut incoming);
            queue.sort_by(|a, b| a.dequeue_order(b));
        })?;
        Ok(())
    }

    /// Pop the highest-priority inbound message and attempt delivery.
    ///
    /// Returns the delivered message's ID, or None when inbound is empty.
    /// Failures never propagate to the caller; they move the message to
    /// outbound or dead-letter.
    async fn deliver_next(&self) -> Result<Option<gaffer_core::MessageId>> {
        let next = {
            let _guard = self.inbound_mutex.lock();
            let mut popped = None;
            self.store.update(OrchQueueKind::Inbound, |queue| {
                queue.sort_by(|a, b| a.dequeue_order(b));
                if !queue.is_empty() {
                    popped = Some(queue.remove(0));
                }
            })?;
            popped
        };
        let Some(mut queued) = next else {
            return Ok(None);
        };

        let id = queued.message.id.clone();
        queued.attempts += 1;
        queued.last_attempt = Some(self.clock.utc_now());

        match self.attempt_delivery(&queued.message).await {
            Ok(()) => {
                tracing::info!(message = %id, attempts = queued.attempts, "orchestrated delivery");
                Ok(Some(id))
            }
            Err(e) => {
                queued.error = Some(e.to_string());
                if e.category() != Category::Transient || queued.attempts > self.cfg.max_retries {
                    tracing::warn!(
                        message = %id,
                        attempts = queued.attempts,
                        error = %e,
                        "message permanently failed, dead-lettering"
                    );
                    self.push_dead_letter(queued)?;
                } else {
                    self.push_outbound(queued)?;
                }
                Ok(Some(id))
            }
        }
    }

    async fn attempt_delivery(&self, message: &Message) -> Result<()> {
        let receipt = self.router.send(message).await?;
        if message.delivery == Delivery::Interrupt {
            let notice = format!(
                "[gaffer] interrupt mail from {}: {} ({})",
                message.from, message.subject, message.id
            );
            for recipient in &receipt.recipients {
                self.injector.inject(recipient, &notice).await?;
            }
        }
        Ok(())
    }

    fn push_outbound(&self, queued: QueuedMessage) -> Result<()> {
        let _guard = self.outbound_mutex.lock();
        self.store.update(OrchQueueKind::Outbound, |queue| {
            queue.push(queued);
        })?;
        Ok(())
    }

    fn push_dead_letter(&self, mut queued: QueuedMessage) -> Result<()> {
        queued.message.status = gaffer_core::MessageStatus::Failed;
        let _guard = self.dead_letter_mutex.lock();
        self.store.update(OrchQueueKind::DeadLetter, |queue| {
            queue.push(queued);
        })?;
        Ok(())
    }

    /// Move outbound entries whose retry delay has elapsed back to
    /// inbound; entries past the retry budget go to dead-letter.
    fn requeue_due(&self) -> Result<()> {
        let now = self.clock.utc_now();
        let retry_delay = chrono::Duration::seconds(self.cfg.retry_delay as i64);

        let mut due = Vec::new();
        let mut exhausted = Vec::new();
        {
            let _guard = self.outbound_mutex.lock();
            self.store.update(OrchQueueKind::Outbound, |queue| {
                let mut keep = Vec::new();
                for entry in queue.drain(..) {
                    if entry.attempts > self.cfg.max_retries {
                        exhausted.push(entry);
                    } else if entry
                        .last_attempt
                        .map(|t| t + retry_delay <= now)
                        .unwrap_or(true)
                    {
                        due.push(entry);
                    } else {
                        keep.push(entry);
                    }
                }
                *queue = keep;
            })?;
        }

        for entry in exhausted {
            self.push_dead_letter(entry)?;
        }
        if !due.is_empty() {
            tracing::debug!(count = due.len(), "re-enqueueing for retry");
            self.push_inbound(due)?;
        }
        Ok(())
    }
}

/// Catch panics at the loop boundary so one crashing loop never takes
/// the process down; the error is logged and the loop ends.
fn loop_guard(
    name: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let task = tokio::spawn(fut);
        if let Err(e) = task.await {
            tracing::error!(loop_name = name, error = %e, "orchestrator loop crashed");
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
