//! [`GitOps`] backed by git2 for reads and the `git` binary for writes.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use git2::{Oid, Repository};
use tracing::{debug, info, info_span, warn};

use super::{GitOps, GitOpsConfig};
use crate::release::CommitStatus;

/// Git operations on a working copy.
pub struct SystemGit {
    workdir: PathBuf,
    config: GitOpsConfig,
}

impl SystemGit {
    /// Operates on the repository at `workdir`.
    pub fn new<P: AsRef<Path>>(workdir: P, config: GitOpsConfig) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            config,
        }
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.workdir)
            .with_context(|| format!("Failed to open git repository: {}", self.workdir.display()))
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "Running git");
        let output = Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute git {}", args.first().unwrap_or(&"")))?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git {} failed: {}", args.join(" "), error_msg.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `-c user.name=.. -c user.email=..`, preferring the repository's own identity.
    fn identity(&self) -> Vec<String> {
        let configured = self.open().and_then(|repo| Ok(repo.config()?));
        let lookup = |key: &str, fallback: &str| {
            configured
                .as_ref()
                .ok()
                .and_then(|c| c.get_string(key).ok())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        if let Err(e) = &configured {
            warn!("Cannot read git config, using default identity: {e}");
        }

        vec![
            "-c".to_string(),
            format!("user.name={}", lookup("user.name", &self.config.user_name)),
            "-c".to_string(),
            format!("user.email={}", lookup("user.email", &self.config.user_email)),
        ]
    }

    fn current_branch(&self) -> Option<String> {
        let repo = self.open().ok()?;
        let head = repo.head().ok()?;
        head.shorthand()
            .filter(|name| *name != "HEAD")
            .map(str::to_string)
    }

    fn head_id(&self) -> Result<String> {
        let repo = self.open()?;
        let head = repo.head().context("Failed to get HEAD reference")?;
        let commit = head.peel_to_commit().context("HEAD is not a commit")?;
        Ok(commit.id().to_string())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        if self.current_branch().as_deref() == Some(branch) {
            return Ok(());
        }
        info!(branch, "Checking out branch");
        self.git(&["fetch", "--depth=1", "origin", branch])?;
        self.git(&["checkout", branch])?;
        Ok(())
    }

    fn run_with_identity(&self, args: &[&str]) -> Result<String> {
        let identity = self.identity();
        let mut full: Vec<&str> = identity.iter().map(String::as_str).collect();
        full.extend_from_slice(args);
        self.git(&full)
    }
}

impl GitOps for SystemGit {
    fn commit(&self, branch: &str, message: &str) -> Result<CommitStatus> {
        let _span = info_span!("git_commit", branch).entered();
        self.checkout(branch)?;

        let mut args = vec!["commit"];
        if self.config.must_sign {
            args.push("-S");
        }
        args.extend_from_slice(&["-a", "-m", message]);
        self.run_with_identity(&args)
            .with_context(|| format!("Cannot commit on branch {branch}"))?;

        let commit_id = self.head_id()?;
        info!(commit = %commit_id, message, "Committed");
        Ok(CommitStatus {
            is_committed: true,
            is_pushed: false,
            commit_id: Some(commit_id),
            commit_msg: Some(message.to_string()),
        })
    }

    fn tag(&self, tag: &str, message: &str) -> Result<CommitStatus> {
        let _span = info_span!("git_tag", tag).entered();
        let commit_id = self.head_id()?;

        let mut args = vec!["tag"];
        if self.config.must_sign {
            args.push("-s");
        }
        args.extend_from_slice(&["-a", "-m", message, tag, commit_id.as_str()]);
        self.run_with_identity(&args)
            .with_context(|| format!("Cannot tag {tag}"))?;

        info!(commit = %commit_id, "Tagged");
        Ok(CommitStatus {
            is_committed: true,
            is_pushed: false,
            commit_id: Some(commit_id),
            commit_msg: Some(message.to_string()),
        })
    }

    fn push(&self, refspec: &str, dry_run: bool) -> Result<bool> {
        let mut args = vec!["push"];
        if dry_run {
            args.push("--dry-run");
        }
        args.extend_from_slice(&["origin", refspec]);
        self.git(&args)
            .with_context(|| format!("Cannot push {refspec}"))?;

        info!(refspec, dry_run, "Pushed");
        Ok(!dry_run)
    }

    fn latest_tags(&self, prefix: &str) -> Result<Vec<String>> {
        let repo = self.open()?;
        let names = repo
            .tag_names(Some(&format!("{prefix}*")))
            .context("Failed to list tags")?;

        Ok(names
            .iter()
            .flatten()
            .filter_map(|name| name.strip_prefix(prefix))
            .map(str::to_string)
            .collect())
    }

    fn commit_message(&self, sha: &str) -> Result<String> {
        let repo = self.open()?;
        let oid = Oid::from_str(sha).with_context(|| format!("Invalid commit id: {sha}"))?;
        let commit = repo
            .find_commit(oid)
            .with_context(|| format!("Commit not found: {sha}"))?;
        Ok(commit.message().unwrap_or_default().trim_end().to_string())
    }

    fn remove_remote_branch(&self, branch: &str) -> Result<()> {
        self.git(&["push", "origin", &format!(":{branch}")])
            .with_context(|| format!("Cannot remove remote branch {branch}"))?;
        info!(branch, "Removed remote branch");
        Ok(())
    }
}
