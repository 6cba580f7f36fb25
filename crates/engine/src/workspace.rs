// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace preparation for agent execution.
//!
//! Each agent owns one branch-pinned working tree under the workspaces
//! directory. Creation is idempotent; destruction refuses to discard
//! uncommitted work unless forced.

use chrono::NaiveDate;
use gaffer_adapters::{VcsAdapter, VcsError};
use gaffer_core::{AgentId, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An isolated working directory tied to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub agent: AgentId,
    pub path: PathBuf,
    pub branch: String,
}

/// Creates and destroys per-agent working trees.
#[derive(Clone)]
pub struct WorkspaceManager<V> {
    vcs: V,
    base_repo: PathBuf,
    workspaces_dir: PathBuf,
}

impl<V: VcsAdapter> WorkspaceManager<V> {
    pub fn new(vcs: V, base_repo: impl Into<PathBuf>, workspaces_dir: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            base_repo: base_repo.into(),
            workspaces_dir: workspaces_dir.into(),
        }
    }

    fn meta_path(&self, agent: &AgentId) -> PathBuf {
        self.workspaces_dir.join(format!("{}.workspace.json", agent))
    }

    fn tree_path(&self, agent: &AgentId) -> PathBuf {
        self.workspaces_dir.join(agent.as_str())
    }

    /// Existing workspace record for `agent`, if any.
    pub fn get(&self, agent: &AgentId) -> Result<Option<Workspace>> {
        let path = self.meta_path(agent);
        gaffer_storage::atomic::read_json(&path)
            .map_err(|e| gaffer_core::error::io_error("workspace.IO", &path, e))
    }

    /// Create the agent's workspace, or return the existing one unchanged.
    ///
    /// The branch name is derived from the agent and date; a collision
    /// with a leftover branch gets a monotonic `-N` suffix.
    pub async fn create(&self, agent: &AgentId, date: NaiveDate) -> Result<Workspace> {
        if let Some(existing) = self.get(agent)? {
            if existing.path.exists() {
                return Ok(existing);
            }
        }

        let path = self.tree_path(agent);
        let branch = self.pick_branch(agent, date).await?;

        self.vcs
            .worktree_add(&self.base_repo, &branch, &path)
            .await
            .map_err(|e| wrap_vcs("workspace.Create", e))?;
        self.vcs
            .set_identity(&path, agent.as_str(), &format!("{}@gaffer.invalid", agent))
            .await
            .map_err(|e| wrap_vcs("workspace.Identity", e))?;

        let workspace = Workspace {
            agent: agent.clone(),
            path,
            branch,
        };
        let meta = self.meta_path(agent);
        gaffer_storage::atomic::write_json(&meta, &workspace)
            .map_err(|e| gaffer_core::error::io_error("workspace.IO", &meta, e))?;

        tracing::info!(agent = %agent, branch = workspace.branch, "workspace created");
        Ok(workspace)
    }

    /// Remove the agent's working tree and branch.
    ///
    /// Without `force`, uncommitted modifications fail the destroy with a
    /// User error. Absent workspaces are a no-op success.
    pub async fn destroy(&self, agent: &AgentId, force: bool) -> Result<()> {
        let Some(workspace) = self.get(agent)? else {
            return Ok(());
        };

        if workspace.path.exists() {
            if !force {
                let status = self
                    .vcs
                    .status(&workspace.path)
                    .await
                    .map_err(|e| wrap_vcs("workspace.Status", e))?;
                if !status.is_clean() {
                    return Err(Error::user(
                        "workspace.DirtyTree",
                        "workspace has uncommitted changes",
                    )
                    .with_context("agent", agent)
                    .with_context("path", workspace.path.display())
                    .with_context("dirty_files", status.dirty.len())
                    .with_hint("commit or discard the changes, or destroy with force"));
                }
            }
            self.vcs
                .worktree_remove(&self.base_repo, &workspace.path, force)
                .await
                .map_err(|e| wrap_vcs("workspace.Destroy", e))?;
        }

        // Branch cleanup is best-effort; an integrated branch may be gone.
        if let Err(e) = self
            .vcs
            .delete_branch(&self.base_repo, &workspace.branch, true)
            .await
        {
            tracing::debug!(agent = %agent, branch = workspace.branch, error = %e, "branch delete skipped");
        }

        let meta = self.meta_path(agent);
        if let Err(e) = std::fs::remove_file(&meta) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(gaffer_core::error::io_error("workspace.IO", &meta, e));
            }
        }
        tracing::info!(agent = %agent, "workspace destroyed");
        Ok(())
    }

    /// Probe that a write in `a`'s tree is not observable in `b`'s tree.
    pub async fn is_isolated(&self, a: &Workspace, b: &Workspace) -> Result<bool> {
        if a.path == b.path || a.branch == b.branch {
            return Ok(false);
        }
        let probe = format!(".isolation-probe-{}", uuid::Uuid::new_v4());
        let probe_a = a.path.join(&probe);
        std::fs::write(&probe_a, b"probe")
            .map_err(|e| gaffer_core::error::io_error("workspace.IO", &probe_a, e))?;
        let leaked = b.path.join(&probe).exists();
        let _ = std::fs::remove_file(&probe_a);
        Ok(!leaked)
    }
}

/// Branch name: `gaffer/<agent>/<yyyymmdd>`, suffixed on collision.
impl<V: VcsAdapter> WorkspaceManager<V> {
    async fn pick_branch(&self, agent: &AgentId, date: NaiveDate) -> Result<String> {
        let base = format!("gaffer/{}/{}", agent, date.format("%Y%m%d"));
        let mut candidate = base.clone();
        let mut suffix = 1u32;
        loop {
            let exists = self
                .vcs
                .branch_exists(&self.base_repo, &candidate)
                .await
                .map_err(|e| wrap_vcs("workspace.Branch", e))?;
            if !exists {
                return Ok(candidate);
            }
            suffix += 1;
            candidate = format!("{}-{}", base, suffix);
        }
    }
}

fn wrap_vcs(code: &str, e: VcsError) -> Error {
    match e {
        VcsError::NotInstalled(tool) => {
            Error::system("tool.NotInstalled", format!("{} is not installed", tool))
                .with_hint("install the version-control tool and retry")
        }
        VcsError::NotARepo(path) => Error::user(code, "not a repository")
            .with_context("path", path)
            .with_hint("point base_repo at a checkout of the rig"),
        VcsError::CommandFailed(msg) => Error::transient(code, msg),
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
