//! S2: crash recovery preserves work.
//!
//! Agents and coordinator die without cleanup; a fresh coordinator's
//! startup sweep releases every orphaned claim and the aggregate status
//! reports the full backlog available again.

use crate::prelude::Root;
use gaffer_adapters::{FakeSessionAdapter, FakeVcs};
use gaffer_core::{AgentId, Config, ItemId, ItemStatus, SystemClock, WorkItem};
use gaffer_daemon::coordinator::{Coordinator, CoordinatorDeps};
use gaffer_daemon::lifecycle::{self, PidLock};
use gaffer_engine::HookEngine;
use std::sync::Arc;

/// Seed a crashed world: five items, three dead agents holding claims,
/// and a pid file from a coordinator that no longer exists.
fn seed_crash(root: &Root) {
    let queue = root.queue();
    let agents = root.agents();

    for n in 1..=5 {
        queue
            .push(WorkItem::new(format!("item-{}", n), "task", "t"))
            .unwrap();
    }
    for n in 1..=3 {
        let agent = AgentId::new(format!("agent-{}", n));
        agents.ensure_agent(&agent).unwrap();
        // PIDs that cannot exist: the agents are gone.
        agents.write_pid(&agent, 3_999_990 + n).unwrap();
        queue
            .claim(&ItemId::new(format!("item-{}", n)), &agent)
            .unwrap();
    }

    std::fs::create_dir_all(root.layout.coordinator_dir()).unwrap();
    std::fs::write(root.layout.coordinator_pid_file(), "3999999").unwrap();
}

#[tokio::test]
async fn restart_releases_all_orphaned_claims() {
    let root = Root::new();
    seed_crash(&root);

    // New coordinator: pid lock detects the crash, recovery sweeps.
    let (_pid_lock, crashed) = PidLock::acquire(&root.layout).unwrap();
    assert!(crashed, "previous coordinator's death must be detected");

    let report = lifecycle::recover(&root.agents(), &root.queue()).unwrap();
    assert_eq!(report.dead_agents.len(), 3);
    assert_eq!(report.reclaimed_items.len(), 3);

    let queue = root.queue();
    for n in 1..=5 {
        let item = queue.get(&ItemId::new(format!("item-{}", n))).unwrap();
        assert_eq!(item.status, ItemStatus::Available, "item-{}", n);
        assert!(item.claimant.is_none());
    }
    assert!(!root.path().join("claims/item-1.claim").exists());

    // One supervision pass publishes the recovered picture.
    let coordinator = Coordinator::new(CoordinatorDeps {
        layout: root.layout.clone(),
        queue: root.queue(),
        agents: root.agents(),
        session_adapter: FakeSessionAdapter::new(),
        vcs: FakeVcs::new(),
        hooks: Arc::new(HookEngine::empty()),
        clock: SystemClock,
        cfg: Config {
            parallel_agents: 0,
            ..Config::default()
        },
        base_repo: root.path().join("rig"),
        agent_cmd: "stub-agent".to_string(),
    });
    coordinator.tick().await.unwrap();

    let raw = std::fs::read_to_string(
        root.path().join("coordinator/aggregate-status.json"),
    )
    .unwrap();
    let status: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(status["work_queue"]["total"], 5);
    assert_eq!(status["work_queue"]["available"], 5);
    assert_eq!(status["work_queue"]["claimed"], 0);
}

#[test]
fn no_work_is_lost_across_the_crash() {
    // P2: every seeded item is still in exactly one lifecycle state.
    let root = Root::new();
    seed_crash(&root);
    lifecycle::recover(&root.agents(), &root.queue()).unwrap();

    let items = root.queue().list_all().unwrap();
    assert_eq!(items.len(), 5, "nothing dropped");
    for item in items {
        assert!(
            matches!(
                item.status,
                ItemStatus::Available
                    | ItemStatus::Claimed
                    | ItemStatus::Completed
                    | ItemStatus::Failed
                    | ItemStatus::Parked
            ),
            "{} in a recognized state",
            item.id
        );
    }
}
