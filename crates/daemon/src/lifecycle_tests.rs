// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gaffer_core::config::LockConfig;
use gaffer_core::{ItemId, ItemStatus, WorkItem};
use gaffer_storage::LockManager;
use tempfile::TempDir;

fn stores(dir: &TempDir) -> (RootLayout, AgentStateStore, WorkQueue) {
    let layout = RootLayout::new(dir.path());
    let locks = LockManager::new(layout.locks_dir(), &LockConfig::default());
    (
        layout.clone(),
        AgentStateStore::new(layout.clone()),
        WorkQueue::new(layout, locks),
    )
}

#[test]
fn pid_lock_records_own_pid() {
    let dir = TempDir::new().unwrap();
    let (layout, _, _) = stores(&dir);

    let (lock, crashed) = PidLock::acquire(&layout).unwrap();
    assert!(!crashed, "fresh root has no predecessor");

    let recorded = std::fs::read_to_string(lock.path()).unwrap();
    assert_eq!(recorded.trim(), std::process::id().to_string());
}

#[test]
fn second_acquire_in_same_process_group_fails() {
    let dir = TempDir::new().unwrap();
    let (layout, _, _) = stores(&dir);

    let (_held, _) = PidLock::acquire(&layout).unwrap();
    // flock is per open file description; a second open contends.
    let err = PidLock::acquire(&layout).unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyRunning));
}

#[test]
fn dead_pid_in_unlocked_file_means_crash() {
    let dir = TempDir::new().unwrap();
    let (layout, _, _) = stores(&dir);

    std::fs::create_dir_all(layout.coordinator_dir()).unwrap();
    std::fs::write(layout.coordinator_pid_file(), "3999999").unwrap();

    let (_lock, crashed) = PidLock::acquire(&layout).unwrap();
    assert!(crashed, "stale pid file signals a crashed predecessor");
}

#[test]
fn recover_releases_claims_of_dead_agents() {
    let dir = TempDir::new().unwrap();
    let (_layout, agents, queue) = stores(&dir);

    // Three agents of a previous run, each holding a claim. One is still
    // alive (this process), two are dead.
    for (name, pid) in [
        ("agent-1", std::process::id()),
        ("agent-2", 3_999_998),
        ("agent-3", 3_999_999),
    ] {
        let agent = AgentId::new(name);
        agents.ensure_agent(&agent).unwrap();
        agents.write_pid(&agent, pid).unwrap();
        agents.write_status(&agent, AgentStatus::Working).unwrap();

        let item = format!("item-{}", name);
        queue.push(WorkItem::new(item.as_str(), "task", "t")).unwrap();
        queue.claim(&ItemId::new(&item), &agent).unwrap();
    }

    let report = recover(&agents, &queue).unwrap();

    assert_eq!(report.dead_agents.len(), 2);
    assert_eq!(report.reclaimed_items.len(), 2);
    assert!(!report.dead_agents.contains(&AgentId::new("agent-1")));

    // Live agent keeps its claim; dead agents' items are available again.
    assert_eq!(
        queue.get(&ItemId::new("item-agent-1")).unwrap().status,
        ItemStatus::Claimed
    );
    for item in ["item-agent-2", "item-agent-3"] {
        let record = queue.get(&ItemId::new(item)).unwrap();
        assert_eq!(record.status, ItemStatus::Available);
        assert!(record.claimant.is_none());
    }

    // Dead agents are marked dead.
    assert_eq!(
        agents.read_status(&AgentId::new("agent-2")).unwrap().unwrap().status,
        AgentStatus::Dead
    );
}

#[test]
fn recover_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (_layout, agents, queue) = stores(&dir);

    let agent = AgentId::new("agent-dead");
    agents.ensure_agent(&agent).unwrap();
    agents.write_pid(&agent, 3_999_999).unwrap();
    queue.push(WorkItem::new("item-1", "task", "t")).unwrap();
    queue.claim(&ItemId::new("item-1"), &agent).unwrap();

    let first = recover(&agents, &queue).unwrap();
    assert_eq!(first.reclaimed_items.len(), 1);

    let second = recover(&agents, &queue).unwrap();
    assert!(second.reclaimed_items.is_empty(), "nothing left to reclaim");
}
