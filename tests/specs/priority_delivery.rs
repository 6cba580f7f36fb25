//! S5: priority ordering and interrupt delivery.
//!
//! Three messages queued together dequeue urgent-first; the interrupt
//! one both lands in the mailbox and injects a notice into the live
//! session, the others only land in the mailbox.

use crate::prelude::{test_registry, Root};
use gaffer_adapters::FakeSessionAdapter;
use gaffer_core::config::OrchestratorConfig;
use gaffer_core::{AgentId, Delivery, Message, Priority, SystemClock};
use gaffer_daemon::inject::PoolInjector;
use gaffer_engine::{HookEngine, MailOrchestrator, NullBacklog, SessionManager};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn urgent_interrupt_dequeues_first_and_injects() {
    let root = Root::new();

    // Live session for the recipient's pool agent.
    let fake = FakeSessionAdapter::new();
    let sessions = SessionManager::new(
        fake.clone(),
        root.agents(),
        Arc::new(HookEngine::empty()),
        SystemClock,
        Duration::from_secs(2),
    );
    let ws = root.path().join("ws");
    std::fs::create_dir_all(&ws).unwrap();
    sessions
        .start(&AgentId::new("agent-1"), &ws, "stub-agent", None)
        .await
        .unwrap();

    let orch = Arc::new(MailOrchestrator::new(
        root.orch_store(),
        root.router(),
        Arc::new(PoolInjector::new(sessions, test_registry())),
        Arc::new(NullBacklog),
        SystemClock,
        OrchestratorConfig {
            poll_interval: 1,
            retry_delay: 1,
            max_retries: 3,
        },
    ));

    let to = "gastown/packer";
    let a = Message::new("m-a", "gastown/witness", to, "routine", "body");
    let b = Message::new("m-b", "gastown/witness", to, "drop everything", "body")
        .with_priority(Priority::Urgent)
        .with_delivery(Delivery::Interrupt);
    let c = Message::new("m-c", "gastown/witness", to, "soon please", "body")
        .with_priority(Priority::High);

    orch.submit(a).unwrap();
    orch.submit(b).unwrap();
    orch.submit(c).unwrap();
    orch.tick().await.unwrap();

    // Dequeue order observable as mailbox append order: B, C, A.
    let inbox = root.mailboxes().read_all(to).unwrap();
    let order: Vec<&str> = inbox.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(order, ["m-b", "m-c", "m-a"]);

    // Only the interrupt message injected a session notice.
    let injected = fake.injected("gaffer-agent-1-worker");
    assert_eq!(injected.len(), 1);
    assert!(injected[0].contains("drop everything"));
    assert!(injected[0].contains("gastown/witness"));
}

#[tokio::test]
async fn send_receipt_roundtrips_message_fields() {
    // R1: show(send(M).id) yields M's observable fields unchanged.
    let root = Root::new();
    let router = root.router();

    let sent = Message::new("m-rt", "gastown/witness", "gastown/packer", "subject!", "body!")
        .with_priority(Priority::High);
    let receipt = router.send(&sent).await.unwrap();

    let shown = router.show(&receipt.id).unwrap();
    assert_eq!(shown.id, sent.id);
    assert_eq!(shown.from, sent.from);
    assert_eq!(shown.to, sent.to);
    assert_eq!(shown.subject, sent.subject);
    assert_eq!(shown.body, sent.body);
    assert_eq!(shown.priority, sent.priority);
    assert_eq!(shown.delivery, sent.delivery);
}
