//! Git collaborator used by the release pipeline.

pub mod system;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::release::CommitStatus;

pub use system::SystemGit;

/// Commit, tag and identity settings for automated git writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GitOpsConfig {
    /// Allow committing corrected or upgraded versions.
    pub allow_commit: bool,
    /// Allow tagging merged releases.
    pub allow_tag: bool,
    /// GPG-sign commits and tags.
    pub must_sign: bool,
    /// Prefix marking commits made by the pipeline.
    pub prefix_ci_msg: String,
    /// Message of a version correction commit.
    pub correct_ver_msg: String,
    /// Message of a next version commit.
    pub next_ver_msg: String,
    /// Message of a release tag.
    pub release_ver_msg: String,
    /// Committer name when the repository has none configured.
    pub user_name: String,
    /// Committer email when the repository has none configured.
    pub user_email: String,
}

impl Default for GitOpsConfig {
    fn default() -> Self {
        Self {
            allow_commit: true,
            allow_tag: true,
            must_sign: false,
            prefix_ci_msg: "<ci-auto-commit>".to_string(),
            correct_ver_msg: "Correct version".to_string(),
            next_ver_msg: "Next version".to_string(),
            release_ver_msg: "Release version".to_string(),
            user_name: "ci-bot".to_string(),
            user_email: "actions@github.com".to_string(),
        }
    }
}

impl GitOpsConfig {
    /// Message of the commit correcting the version to `version`.
    pub fn correct_version_message(&self, version: &str) -> String {
        format!("{} {} {version}", self.prefix_ci_msg, self.correct_ver_msg)
    }

    /// Message of the commit moving to `version`.
    pub fn next_version_message(&self, version: &str) -> String {
        format!("{} {} {version}", self.prefix_ci_msg, self.next_ver_msg)
    }

    /// Message of the release tag `tag`.
    pub fn release_message(&self, tag: &str) -> String {
        format!("{} {tag}", self.release_ver_msg)
    }
}

/// Git operations the release pipeline performs.
pub trait GitOps: Send + Sync {
    /// Commits all tracked changes on `branch`.
    fn commit(&self, branch: &str, message: &str) -> Result<CommitStatus>;

    /// Creates the annotated tag `tag` on HEAD.
    fn tag(&self, tag: &str, message: &str) -> Result<CommitStatus>;

    /// Pushes `refspec` to origin. Returns whether anything was pushed.
    fn push(&self, refspec: &str, dry_run: bool) -> Result<bool>;

    /// Versions of the tags named `<prefix><version>`, prefix stripped.
    fn latest_tags(&self, prefix: &str) -> Result<Vec<String>>;

    /// Full message of commit `sha`.
    fn commit_message(&self, sha: &str) -> Result<String>;

    /// Deletes `branch` on origin.
    fn remove_remote_branch(&self, branch: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_follow_templates() {
        let config = GitOpsConfig::default();
        assert_eq!(
            config.correct_version_message("1.0.1"),
            "<ci-auto-commit> Correct version 1.0.1"
        );
        assert_eq!(
            config.next_version_message("1.1.0"),
            "<ci-auto-commit> Next version 1.1.0"
        );
        assert_eq!(config.release_message("v1.0.1"), "Release version v1.0.1");
    }
}
