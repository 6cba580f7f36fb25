//! Shared fixtures for the behavioral specs.

use gaffer_core::config::LockConfig;
use gaffer_engine::{HookEngine, RegisteredAgent, Router, RouterRegistry};
use gaffer_storage::{
    AgentStateStore, LockManager, MailboxStore, OrchQueueStore, RootLayout, WorkQueue,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// One state root with every store wired to it.
pub struct Root {
    pub dir: TempDir,
    pub layout: RootLayout,
    pub locks: LockManager,
}

impl Root {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = RootLayout::new(dir.path());
        let locks = LockManager::new(layout.locks_dir(), &LockConfig::default());
        Self { dir, layout, locks }
    }

    pub fn queue(&self) -> WorkQueue {
        WorkQueue::new(self.layout.clone(), self.locks.clone())
    }

    pub fn agents(&self) -> AgentStateStore {
        AgentStateStore::new(self.layout.clone())
    }

    pub fn mailboxes(&self) -> MailboxStore {
        MailboxStore::new(self.layout.clone(), self.locks.clone())
    }

    pub fn orch_store(&self) -> OrchQueueStore {
        OrchQueueStore::new(self.layout.clone(), self.locks.clone())
    }

    pub fn router(&self) -> Arc<Router> {
        Arc::new(Router::new(
            self.mailboxes(),
            Arc::new(HookEngine::empty()),
            test_registry(),
        ))
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

/// Registry with one embodied recipient on the `gastown` rig.
pub fn test_registry() -> RouterRegistry {
    RouterRegistry {
        agents: vec![RegisteredAgent {
            rig: "gastown".into(),
            name: "packer".into(),
            role: Some("packer".into()),
            agent_id: Some(gaffer_core::AgentId::new("agent-1")),
        }],
        lists: HashMap::new(),
        queues: Vec::new(),
        channels: Vec::new(),
    }
}
