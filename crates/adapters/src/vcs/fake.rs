// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake VCS adapter for testing

use super::{VcsAdapter, VcsError, VcsStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct State {
    /// worktree path → branch
    worktrees: HashMap<PathBuf, String>,
    branches: HashSet<String>,
    /// paths reported dirty by status()
    dirty: HashMap<PathBuf, Vec<String>>,
    /// branch → commits ahead of base
    ahead: HashMap<String, u32>,
    identities: HashMap<PathBuf, (String, String)>,
}

/// In-memory VCS adapter; worktree directories are really created so
/// filesystem-level isolation checks work.
#[derive(Clone, Default)]
pub struct FakeVcs {
    state: Arc<Mutex<State>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a workspace dirty so destroy-without-force fails.
    pub fn set_dirty(&self, path: &Path, files: &[&str]) {
        self.state.lock().dirty.insert(
            path.to_path_buf(),
            files.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn set_commits_ahead(&self, branch: &str, n: u32) {
        self.state.lock().ahead.insert(branch.to_string(), n);
    }

    pub fn branches(&self) -> Vec<String> {
        let mut branches: Vec<String> = self.state.lock().branches.iter().cloned().collect();
        branches.sort();
        branches
    }

    pub fn identity(&self, path: &Path) -> Option<(String, String)> {
        self.state.lock().identities.get(path).cloned()
    }
}

#[async_trait]
impl VcsAdapter for FakeVcs {
    async fn worktree_add(&self, _repo: &Path, branch: &str, path: &Path) -> Result<(), VcsError> {
        let mut state = self.state.lock();
        if state.branches.contains(branch) {
            return Err(VcsError::CommandFailed(format!(
                "branch already exists: {}",
                branch
            )));
        }
        std::fs::create_dir_all(path)
            .map_err(|e| VcsError::CommandFailed(e.to_string()))?;
        state.branches.insert(branch.to_string());
        state.worktrees.insert(path.to_path_buf(), branch.to_string());
        Ok(())
    }

    async fn worktree_remove(&self, _repo: &Path, path: &Path, force: bool) -> Result<(), VcsError> {
        let mut state = self.state.lock();
        let has_dirt = state
            .dirty
            .get(path)
            .map(|d| !d.is_empty())
            .unwrap_or(false);
        if has_dirt && !force {
            return Err(VcsError::CommandFailed(
                "contains modified or untracked files".to_string(),
            ));
        }
        state.worktrees.remove(path);
        state.dirty.remove(path);
        if path.exists() {
            std::fs::remove_dir_all(path)
                .map_err(|e| VcsError::CommandFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn commits_ahead(&self, _repo: &Path, _base: &str, branch: &str) -> Result<u32, VcsError> {
        Ok(*self.state.lock().ahead.get(branch).unwrap_or(&0))
    }

    async fn status(&self, path: &Path) -> Result<VcsStatus, VcsError> {
        Ok(VcsStatus {
            dirty: self.state.lock().dirty.get(path).cloned().unwrap_or_default(),
        })
    }

    async fn branch_exists(&self, _repo: &Path, branch: &str) -> Result<bool, VcsError> {
        Ok(self.state.lock().branches.contains(branch))
    }

    async fn set_identity(&self, path: &Path, name: &str, email: &str) -> Result<(), VcsError> {
        self.state
            .lock()
            .identities
            .insert(path.to_path_buf(), (name.to_string(), email.to_string()));
        Ok(())
    }

    async fn delete_branch(&self, _repo: &Path, branch: &str, _force: bool) -> Result<(), VcsError> {
        self.state.lock().branches.remove(branch);
        Ok(())
    }
}
