//! S6: stale claim reclamation by the health check.

use crate::prelude::Root;
use gaffer_adapters::{FakeSessionAdapter, FakeVcs};
use gaffer_core::{AgentId, Config, ItemId, ItemStatus, SystemClock, WorkItem};
use gaffer_daemon::coordinator::{Coordinator, CoordinatorDeps};
use gaffer_engine::HookEngine;
use std::sync::Arc;

#[tokio::test]
async fn three_hour_old_claim_of_dead_agent_is_released() {
    let root = Root::new();
    let queue = root.queue();
    let agents = root.agents();

    // item-777 claimed by agent-x whose PID no longer exists; the claim
    // is three hours old against a two-hour stale-work timeout.
    queue.push(WorkItem::new("item-777", "task", "t")).unwrap();
    let ghost = AgentId::new("agent-x");
    agents.ensure_agent(&ghost).unwrap();
    agents.write_pid(&ghost, 3_999_999).unwrap();
    queue.claim(&ItemId::new("item-777"), &ghost).unwrap();

    let old = chrono::Utc::now() - chrono::Duration::hours(3);
    std::fs::write(
        root.path().join("claims/item-777.claim.timestamp"),
        old.to_rfc3339(),
    )
    .unwrap();

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
            stale_work_timeout: 7200,
            ..Config::default()
        },
        base_repo: root.path().join("rig"),
        agent_cmd: "stub-agent".to_string(),
    });

    coordinator.tick().await.unwrap();

    let item = queue.get(&ItemId::new("item-777")).unwrap();
    assert_eq!(item.status, ItemStatus::Available);
    assert!(item.claimant.is_none());
    assert!(!root.path().join("claims/item-777.claim").exists());
    assert!(!root.path().join("claims/item-777.claim.owner").exists());

    // An audit record notes the reclamation.
    let audit =
        std::fs::read_to_string(root.path().join("coordinator/audit.jsonl")).unwrap();
    assert!(audit.contains("\"reclaim\""));
    assert!(audit.contains("item-777"));
    assert!(audit.contains("agent-x"));
}

#[tokio::test]
async fn fresh_claims_survive_the_health_check() {
    let root = Root::new();
    let queue = root.queue();
    let agents = root.agents();

    queue.push(WorkItem::new("item-1", "task", "t")).unwrap();
    let live = AgentId::new("agent-live");
    agents.ensure_agent(&live).unwrap();
    agents.write_pid(&live, std::process::id()).unwrap();
    agents
        .touch_heartbeat(&live, chrono::Utc::now().timestamp() as u64)
        .unwrap();
    queue.claim(&ItemId::new("item-1"), &live).unwrap();

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

    assert_eq!(
        queue.get(&ItemId::new("item-1")).unwrap().status,
        ItemStatus::Claimed,
        "healthy owner keeps the claim"
    );
}
