// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git CLI adapter

use super::{VcsAdapter, VcsError, VcsStatus};
use crate::subprocess::{run_with_timeout, GIT_WORKTREE_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Git adapter shelling out to the `git` binary.
#[derive(Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

async fn git(cwd: &Path, args: &[&str], description: &str) -> Result<String, VcsError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(cwd).args(args);
    let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, description)
        .await
        .map_err(|e| {
            if e.contains("No such file") || e.contains("not found") {
                VcsError::NotInstalled("git".to_string())
            } else {
                VcsError::CommandFailed(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            return Err(VcsError::NotARepo(cwd.display().to_string()));
        }
        return Err(VcsError::CommandFailed(format!(
            "{}: {}",
            description,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl VcsAdapter for GitCli {
    async fn worktree_add(
        &self,
        repo: &Path,
        branch: &str,
        path: &Path,
    ) -> Result<(), VcsError> {
        let path_str = path.display().to_string();
        git(
            repo,
            &["worktree", "add", "-b", branch, &path_str],
            "git worktree add",
        )
        .await?;
        Ok(())
    }

    async fn worktree_remove(
        &self,
        repo: &Path,
        path: &Path,
        force: bool,
    ) -> Result<(), VcsError> {
        let path_str = path.display().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            // Doubled --force also removes locked working trees.
            args.extend(["--force", "--force"]);
        }
        args.push(&path_str);
        git(repo, &args, "git worktree remove").await?;
        Ok(())
    }

    async fn commits_ahead(
        &self,
        repo: &Path,
        base: &str,
        branch: &str,
    ) -> Result<u32, VcsError> {
        let range = format!("{}..{}", base, branch);
        let out = git(repo, &["rev-list", "--count", &range], "git rev-list").await?;
        out.trim()
            .parse()
            .map_err(|_| VcsError::CommandFailed(format!("unparseable rev-list output: {}", out)))
    }

    async fn status(&self, path: &Path) -> Result<VcsStatus, VcsError> {
        let out = git(path, &["status", "--porcelain"], "git status").await?;
        let dirty = out
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.get(3..).unwrap_or(l).to_string())
            .collect();
        Ok(VcsStatus { dirty })
    }

    async fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, VcsError> {
        let refname = format!("refs/heads/{}", branch);
        let mut cmd = Command::new("git");
        cmd.current_dir(repo)
            .args(["show-ref", "--verify", "--quiet", &refname]);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git show-ref")
            .await
            .map_err(VcsError::CommandFailed)?;
        Ok(output.status.success())
    }

    async fn set_identity(&self, path: &Path, name: &str, email: &str) -> Result<(), VcsError> {
        git(path, &["config", "user.name", name], "git config user.name").await?;
        git(
            path,
            &["config", "user.email", email],
            "git config user.email",
        )
        .await?;
        Ok(())
    }

    async fn delete_branch(&self, repo: &Path, branch: &str, force: bool) -> Result<(), VcsError> {
        let flag = if force { "-D" } else { "-d" };
        git(repo, &["branch", flag, branch], "git branch delete").await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
