//! Normalized description of the triggering event.

use serde::{Deserialize, Serialize};

/// Version implied by the triggering ref.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersion {
    /// Branch or tag name with the release/tag prefix stripped on release events.
    pub branch: String,
}

/// Immutable snapshot of what kind of event is being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeContext {
    /// Current branch name, PR head branch or tag name.
    pub branch: String,
    /// Repository default branch.
    pub default_branch: String,
    /// Whether the ref is the default branch.
    pub on_default_branch: bool,
    /// Neither a pull request nor a tag.
    pub is_branch: bool,
    /// `pull_request` event.
    #[serde(rename = "isPR")]
    pub is_pr: bool,
    /// Ref is a tag.
    pub is_tag: bool,
    /// `schedule` event.
    pub is_schedule: bool,
    /// `workflow_dispatch` or `repository_dispatch` event.
    pub is_dispatch: bool,
    /// Release branch, release pull request or release tag.
    pub is_release: bool,
    /// Hotfix branch, nested under the release prefix or bare.
    pub is_hotfix: bool,
    /// Push carrying the merge commit of a release pull request.
    #[serde(rename = "isAfterMergedReleasePR")]
    pub is_after_merged_release_pr: bool,
    /// Pull request closed by merging.
    pub is_merged: bool,
    /// Pull request closed without merging.
    pub is_closed: bool,
    /// Pull request opened or branch/tag created.
    pub is_opened: bool,
    /// Latest commit message, empty when the event carries none.
    pub commit_msg: String,
    /// Latest commit SHA.
    pub commit_id: String,
    /// Abbreviated commit SHA.
    pub commit_short_id: String,
    /// Pull request target branch.
    #[serde(rename = "prBaseBranch", skip_serializing_if = "Option::is_none")]
    pub pr_base_branch: Option<String>,
    /// Version implied by the ref.
    pub versions: RuntimeVersion,
}

impl RuntimeContext {
    /// Returns a copy carrying `commit_msg`.
    #[must_use]
    pub fn with_commit_msg(&self, commit_msg: String) -> Self {
        Self {
            commit_msg,
            ..self.clone()
        }
    }
}
