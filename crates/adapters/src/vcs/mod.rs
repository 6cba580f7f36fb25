// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-control adapters

mod git;

pub use git::GitCli;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeVcs;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from version-control operations
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("vcs tool not installed: {0}")]
    NotInstalled(String),
    #[error("not a repository: {0}")]
    NotARepo(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Working-tree status of one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcsStatus {
    /// Paths with uncommitted modifications.
    pub dirty: Vec<String>,
}

impl VcsStatus {
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// Adapter for the version-control tool backing workspaces.
#[async_trait]
pub trait VcsAdapter: Clone + Send + Sync + 'static {
    /// Create a linked working tree for `branch` at `path`, creating the
    /// branch from the repository's current HEAD.
    async fn worktree_add(&self, repo: &Path, branch: &str, path: &Path)
        -> Result<(), VcsError>;

    /// Remove a linked working tree. `force` discards local modifications
    /// and removes locked trees.
    async fn worktree_remove(&self, repo: &Path, path: &Path, force: bool)
        -> Result<(), VcsError>;

    /// Number of commits `branch` has that `base` does not.
    async fn commits_ahead(&self, repo: &Path, base: &str, branch: &str)
        -> Result<u32, VcsError>;

    /// Working-tree status at `path`.
    async fn status(&self, path: &Path) -> Result<VcsStatus, VcsError>;

    /// Whether `branch` exists in `repo`.
    async fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, VcsError>;

    /// Pin the author identity used for commits made in `path`.
    async fn set_identity(&self, path: &Path, name: &str, email: &str)
        -> Result<(), VcsError>;

    /// Delete a branch (used when retiring a workspace).
    async fn delete_branch(&self, repo: &Path, branch: &str, force: bool)
        -> Result<(), VcsError>;
}
