//! S4: a pre-shutdown hook blocks stop unless forced.

use crate::prelude::Root;
use gaffer_adapters::FakeSessionAdapter;
use gaffer_core::{AgentId, SystemClock};
use gaffer_engine::{HookEngine, SessionManager};
use std::sync::Arc;
use std::time::Duration;

async fn running_session(root: &Root, hooks_json: &str) -> (FakeSessionAdapter, SessionManager<FakeSessionAdapter, SystemClock>) {
    std::fs::write(root.path().join("hooks.json"), hooks_json).unwrap();
    let hooks = HookEngine::load(
        &root.layout.hooks_file(),
        &root.layout.alt_hooks_file(),
        Duration::from_secs(5),
    )
    .unwrap();

    let fake = FakeSessionAdapter::new();
    let manager = SessionManager::new(
        fake.clone(),
        root.agents(),
        Arc::new(hooks),
        SystemClock,
        Duration::from_secs(2),
    );

    let ws = root.path().join("ws");
    std::fs::create_dir_all(&ws).unwrap();
    manager
        .start(&AgentId::new("agent-1"), &ws, "stub-agent", None)
        .await
        .unwrap();
    (fake, manager)
}

const BLOCKING_HOOKS: &str = r#"{"hooks": {
    "pre-shutdown": [
        {"type": "command", "command": "sh", "args": ["-c", "echo dirty tree >&2; exit 1"]}
    ],
    "post-shutdown": [
        {"type": "command", "command": "sh", "args": ["-c", "touch post-shutdown-ran.txt"]}
    ]
}}"#;

#[tokio::test]
async fn blocked_stop_leaves_session_running() {
    let root = Root::new();
    let (fake, manager) = running_session(&root, BLOCKING_HOOKS).await;

    let err = manager.stop(&AgentId::new("agent-1"), false).await.unwrap_err();
    assert_eq!(err.code(), "hook.Blocked");
    assert!(err.hint().unwrap_or_default().contains("dirty tree"));

    assert!(fake.is_alive("gaffer-agent-1-worker"), "session survives");
    assert!(
        !root.path().join("ws/post-shutdown-ran.txt").exists(),
        "post-shutdown hooks must not fire after a block"
    );
}

#[tokio::test]
async fn forced_stop_runs_hook_but_ignores_block() {
    let root = Root::new();
    let (fake, manager) = running_session(&root, BLOCKING_HOOKS).await;

    manager.stop(&AgentId::new("agent-1"), true).await.unwrap();

    assert!(!fake.is_alive("gaffer-agent-1-worker"), "session killed");
    assert!(
        root.path().join("ws/post-shutdown-ran.txt").exists(),
        "post-shutdown hooks fire after a forced stop"
    );
}
