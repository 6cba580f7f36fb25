// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hooks::HookEngine;
use gaffer_adapters::{FakeSessionAdapter, FakeVcs};
use gaffer_core::config::LockConfig;
use gaffer_core::{ItemStatus, Priority, SystemClock};
use gaffer_storage::{LockManager, RootLayout};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(30);

struct Fixture {
    dir: TempDir,
    fake_sessions: FakeSessionAdapter,
    queue: WorkQueue,
    agents: AgentStateStore,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = RootLayout::new(dir.path());
        let locks = LockManager::new(layout.locks_dir(), &LockConfig::default());
        let queue = WorkQueue::new(layout.clone(), locks);
        let agents = AgentStateStore::new(layout);
        Self {
            dir,
            fake_sessions: FakeSessionAdapter::new(),
            queue,
            agents,
        }
    }

    fn worker(&self, id: &str, monitor_cfg: MonitorConfig) -> Worker<FakeSessionAdapter, FakeVcs, SystemClock> {
        let hooks = Arc::new(HookEngine::empty());
        let sessions = SessionManager::new(
            self.fake_sessions.clone(),
            self.agents.clone(),
            Arc::clone(&hooks),
            SystemClock,
            Duration::from_secs(2),
        );
        let workspaces = WorkspaceManager::new(
            FakeVcs::new(),
            self.dir.path().join("rig"),
            self.dir.path().join("workspaces"),
        );
        Worker::new(
            AgentId::new(id),
            WorkerDeps {
                queue: self.queue.clone(),
                agents: self.agents.clone(),
                workspaces,
                sessions,
                session_adapter: self.fake_sessions.clone(),
                hooks,
                clock: SystemClock,
                monitor_cfg,
                agent_cmd: "claude --print".to_string(),
            },
        )
    }

    fn seed(&self, id: &str, priority: Priority) {
        self.queue
            .push(WorkItem::new(id, "task", format!("work {}", id)).with_priority(priority))
            .unwrap();
    }
}

fn fast_monitor() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(50),
        stall_threshold: Duration::from_secs(600),
        session_timeout: Duration::from_secs(3600),
    }
}

fn no_shutdown() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    // Keep the sender alive for the test's lifetime.
    std::mem::forget(tx);
    rx
}

#[tokio::test]
async fn empty_backlog_leaves_worker_idle() {
    let fx = Fixture::new();
    let worker = fx.worker("agent-1", fast_monitor());

    let report = worker.run_once(no_shutdown()).await.unwrap();
    assert!(report.is_none());
    assert_eq!(
        fx.agents.read_status(&AgentId::new("agent-1")).unwrap().unwrap().status,
        AgentStatus::Idle
    );
}

#[tokio::test]
async fn completes_item_when_agent_exits() {
    let fx = Fixture::new();
    fx.seed("item-1", Priority::Normal);
    let worker = fx.worker("agent-1", fast_monitor());

    // Simulate the agent finishing shortly after launch.
    let sessions = fx.fake_sessions.clone();
    let finisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        sessions.mark_dead("gaffer-agent-1-worker");
    });

    let report = timeout(WAIT, worker.run_once(no_shutdown()))
        .await
        .unwrap()
        .unwrap();
    finisher.await.unwrap();

    assert_eq!(
        report,
        Some(WorkReport::Completed {
            item: gaffer_core::ItemId::new("item-1")
        })
    );
    let item = fx.queue.get(&gaffer_core::ItemId::new("item-1")).unwrap();
    assert_eq!(item.status, ItemStatus::Completed);
    assert!(!fx.queue.is_claimed(&item.id));

    // Bootstrap prompt was written into the workspace.
    let prompt = fx
        .dir
        .path()
        .join("workspaces/agent-1/.gaffer-prompt.md");
    assert!(prompt.exists());
    assert!(std::fs::read_to_string(prompt).unwrap().contains("item-1"));
}

#[tokio::test]
async fn stalled_session_fails_the_item() {
    let fx = Fixture::new();
    fx.seed("item-1", Priority::Normal);
    let worker = fx.worker(
        "agent-1",
        MonitorConfig {
            poll_interval: Duration::from_millis(50),
            stall_threshold: Duration::from_millis(200),
            session_timeout: Duration::from_secs(3600),
        },
    );

    let report = timeout(WAIT, worker.run_once(no_shutdown()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        report,
        Some(WorkReport::Failed {
            item: gaffer_core::ItemId::new("item-1"),
            reason: "stalled".to_string()
        })
    );
    let item = fx.queue.get(&gaffer_core::ItemId::new("item-1")).unwrap();
    assert_eq!(item.status, ItemStatus::Failed);
    assert_eq!(item.failure_count, 1);
    assert!(
        !fx.fake_sessions.is_alive("gaffer-agent-1-worker"),
        "stalled session is torn down"
    );
}

#[tokio::test]
async fn shutdown_releases_the_claim() {
    let fx = Fixture::new();
    fx.seed("item-1", Priority::Normal);
    let worker = fx.worker("agent-1", fast_monitor());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = shutdown_tx.send(true);
        shutdown_tx
    });

    let report = timeout(WAIT, worker.run_once(shutdown_rx))
        .await
        .unwrap()
        .unwrap();
    let _tx = canceller.await.unwrap();

    assert_eq!(
        report,
        Some(WorkReport::Released {
            item: gaffer_core::ItemId::new("item-1")
        })
    );
    let item = fx.queue.get(&gaffer_core::ItemId::new("item-1")).unwrap();
    assert_eq!(item.status, ItemStatus::Available, "work returns to the backlog");
    assert!(item.claimant.is_none());
}

#[tokio::test]
async fn claimed_items_are_skipped_in_order() {
    let fx = Fixture::new();
    fx.seed("item-1", Priority::Urgent);
    fx.seed("item-2", Priority::Normal);

    // Another agent already holds the urgent item.
    fx.queue
        .claim(&gaffer_core::ItemId::new("item-1"), &AgentId::new("agent-other"))
        .unwrap();

    let worker = fx.worker("agent-1", fast_monitor());
    let sessions = fx.fake_sessions.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        sessions.mark_dead("gaffer-agent-1-worker");
    });

    let report = timeout(WAIT, worker.run_once(no_shutdown()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        report,
        Some(WorkReport::Completed {
            item: gaffer_core::ItemId::new("item-2")
        }),
        "worker fell through to the unclaimed item"
    );
}

#[test]
fn shell_quote_escapes_specials() {
    assert_eq!(shell_quote(r#"a"b"#), r#"a\"b"#);
    assert_eq!(shell_quote("$HOME `id`"), r#"\$HOME \`id\`"#);
    assert_eq!(shell_quote(r"back\slash"), r"back\\slash");
    assert_eq!(shell_quote("plain"), "plain");
}
