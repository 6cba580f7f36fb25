// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gaffer_core::config::LockConfig;
use gaffer_core::{Message, QueuedMessage};
use tempfile::TempDir;

fn store(dir: &TempDir) -> OrchQueueStore {
    let layout = RootLayout::new(dir.path());
    let locks = LockManager::new(layout.locks_dir(), &LockConfig::default());
    OrchQueueStore::new(layout, locks)
}

fn queued(id: &str) -> QueuedMessage {
    QueuedMessage::new(
        Message::new(id, "gastown/witness", "gastown/packer", "s", "b"),
        chrono::Utc::now(),
    )
}

#[test]
fn missing_queue_files_load_empty() {
    let dir = TempDir::new().unwrap();
    let queues = store(&dir);
    for kind in [
        OrchQueueKind::Inbound,
        OrchQueueKind::Outbound,
        OrchQueueKind::DeadLetter,
    ] {
        assert!(queues.load(kind).unwrap().is_empty());
    }
}

#[test]
fn store_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let queues = store(&dir);

    queues
        .store(OrchQueueKind::Inbound, &[queued("m-1"), queued("m-2")])
        .unwrap();

    let loaded = queues.load(OrchQueueKind::Inbound).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].message.id, "m-1");
    assert!(dir.path().join("orchestrator/inbound.json").exists());
}

#[test]
fn queues_are_independent_files() {
    let dir = TempDir::new().unwrap();
    let queues = store(&dir);

    queues.store(OrchQueueKind::Outbound, &[queued("m-out")]).unwrap();
    queues.store(OrchQueueKind::DeadLetter, &[queued("m-dead")]).unwrap();

    assert_eq!(queues.load(OrchQueueKind::Inbound).unwrap().len(), 0);
    assert_eq!(queues.load(OrchQueueKind::Outbound).unwrap().len(), 1);
    assert_eq!(
        queues.load(OrchQueueKind::DeadLetter).unwrap()[0].message.id,
        "m-dead"
    );
}

#[test]
fn update_mutates_under_one_lock_hold() {
    let dir = TempDir::new().unwrap();
    let queues = store(&dir);
    queues.store(OrchQueueKind::Inbound, &[queued("m-1")]).unwrap();

    let after = queues
        .update(OrchQueueKind::Inbound, |messages| {
            messages.push(queued("m-2"));
            messages[0].attempts += 1;
        })
        .unwrap();

    assert_eq!(after.len(), 2);
    let reloaded = queues.load(OrchQueueKind::Inbound).unwrap();
    assert_eq!(reloaded[0].attempts, 1);
}
