//! Event classification: raw event → [`RuntimeContext`].

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::payload::GitEvent;
use super::runtime::{RuntimeContext, RuntimeVersion};
use crate::error::ReleaseError;

const TAG_REF_PREFIX: &str = "refs/tags/";
const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Naming conventions the classifier recognises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParserConfig {
    /// Fallback default branch when the payload does not name one.
    pub default_branch: String,
    /// Prefix of release tags.
    pub tag_prefix: String,
    /// Prefix of hotfix branches.
    pub hotfix_prefix: String,
    /// Prefix of release branches.
    pub release_branch_prefix: String,
    /// Regex identifying the merge commit of a release pull request.
    pub merged_release_msg_regex: String,
    /// Length of the abbreviated commit SHA.
    pub sha_length: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            tag_prefix: "v".to_string(),
            hotfix_prefix: "hotfix/".to_string(),
            release_branch_prefix: "release/".to_string(),
            merged_release_msg_regex: "^Merge pull request #[0-9]+ from .+/release/.+$".to_string(),
            sha_length: 7,
        }
    }
}

/// Action carried by a `pull_request` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    /// `opened`.
    Opened,
    /// `closed`, merged or not.
    Closed,
    /// Any other action (`synchronize`, `reopened`, ...).
    Other(String),
}

impl PullRequestAction {
    fn parse(action: &str) -> Self {
        match action {
            "opened" => Self::Opened,
            "closed" => Self::Closed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Kind of triggering event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Commits or a tag pushed.
    Push,
    /// Pull request activity.
    PullRequest {
        /// What happened to the pull request.
        action: PullRequestAction,
        /// Whether it was merged, when the payload says.
        merged: Option<bool>,
    },
    /// Branch or tag created.
    Create,
    /// Scheduled run.
    Schedule,
    /// Manual or cross-workflow dispatch.
    Dispatch,
    /// Anything else.
    Other(String),
}

impl EventKind {
    /// Classifies the event name and pull request state.
    pub fn from_event(event: &GitEvent) -> Self {
        match event.event_name.as_str() {
            "push" => Self::Push,
            "pull_request" => {
                let pr = event.payload.pull_request.as_ref();
                Self::PullRequest {
                    action: PullRequestAction::parse(event.payload.action.as_deref().unwrap_or("")),
                    merged: pr.and_then(|pr| pr.merged),
                }
            }
            "create" => Self::Create,
            "schedule" => Self::Schedule,
            "workflow_dispatch" | "repository_dispatch" => Self::Dispatch,
            other => Self::Other(other.to_string()),
        }
    }

    /// Events on which a release can be detected.
    fn can_release(&self) -> bool {
        matches!(self, Self::Push | Self::PullRequest { .. } | Self::Create)
    }
}

/// What the event's ref points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// A branch, by short name.
    Branch(String),
    /// A tag, by short name.
    Tag(String),
    /// The head branch of a pull request.
    PullRequestHead(String),
}

impl RefKind {
    /// Resolves the ref of `event`, using the pull request head for pull request events.
    pub fn from_event(kind: &EventKind, event: &GitEvent) -> Self {
        if matches!(kind, EventKind::PullRequest { .. }) {
            let head = event
                .payload
                .pull_request
                .as_ref()
                .and_then(|pr| pr.head.ref_name.clone())
                .unwrap_or_default();
            return Self::PullRequestHead(head);
        }

        match event.ref_name.strip_prefix(TAG_REF_PREFIX) {
            Some(tag) => Self::Tag(tag.to_string()),
            None => {
                let branch = event
                    .ref_name
                    .strip_prefix(BRANCH_REF_PREFIX)
                    .unwrap_or(&event.ref_name);
                Self::Branch(branch.to_string())
            }
        }
    }

    /// Short name of the ref.
    pub fn name(&self) -> &str {
        match self {
            Self::Branch(name) | Self::Tag(name) | Self::PullRequestHead(name) => name,
        }
    }
}

/// Classifies events under a [`ParserConfig`].
#[derive(Debug, Clone)]
pub struct GitParser {
    config: ParserConfig,
    merged_release_msg: Regex,
}

impl GitParser {
    /// Compiles the configured merged-release regex (multi-line, case-insensitive).
    pub fn new(config: ParserConfig) -> Result<Self, ReleaseError> {
        let merged_release_msg = RegexBuilder::new(&config.merged_release_msg_regex)
            .multi_line(true)
            .case_insensitive(true)
            .build()
            .map_err(|e| ReleaseError::InvalidPattern {
                pattern: config.merged_release_msg_regex.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            merged_release_msg,
        })
    }

    /// Returns the parser configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Classifies `event`. Pure: identical events give identical contexts.
    pub fn classify(&self, event: &GitEvent) -> RuntimeContext {
        let kind = EventKind::from_event(event);
        let git_ref = RefKind::from_event(&kind, event);
        let payload = &event.payload;

        let is_pr = matches!(kind, EventKind::PullRequest { .. });
        let is_tag = event.ref_name.starts_with(TAG_REF_PREFIX);
        let branch = git_ref.name().to_string();

        let default_branch = payload
            .repository
            .as_ref()
            .and_then(|r| r.default_branch.clone())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| self.config.default_branch.clone());
        let on_default_branch = event.ref_name == format!("{BRANCH_REF_PREFIX}{default_branch}");

        let (is_merged, is_closed) = match &kind {
            EventKind::PullRequest {
                action: PullRequestAction::Closed,
                merged,
            } => (*merged == Some(true), *merged == Some(false)),
            _ => (false, false),
        };
        let is_opened = matches!(
            kind,
            EventKind::PullRequest {
                action: PullRequestAction::Opened,
                ..
            } | EventKind::Create
        );

        let release_prefix = if is_tag {
            &self.config.tag_prefix
        } else {
            &self.config.release_branch_prefix
        };
        let is_release = kind.can_release() && branch.starts_with(release_prefix.as_str());
        let is_hotfix = kind.can_release() && branch.starts_with(&self.hotfix_prefix(is_release));

        let commit_msg = payload
            .head_commit
            .as_ref()
            .and_then(|c| c.message.clone())
            .unwrap_or_default();
        let is_after_merged_release_pr = kind == EventKind::Push
            && (on_default_branch || is_hotfix)
            && self.merged_release_msg.is_match(commit_msg.trim());

        let pull_request = payload.pull_request.as_ref();
        let commit_id = if is_pr && !is_merged {
            pull_request
                .and_then(|pr| pr.head.sha.clone())
                .filter(|sha| !sha.is_empty())
                .unwrap_or_else(|| event.sha.clone())
        } else {
            event.sha.clone()
        };
        let commit_short_id = commit_id.chars().take(self.config.sha_length).collect();
        let pr_base_branch = if is_pr {
            pull_request.and_then(|pr| pr.base.ref_name.clone())
        } else {
            None
        };

        let versions = RuntimeVersion {
            branch: self.branch_version(&branch, is_tag, is_release, is_hotfix),
        };

        RuntimeContext {
            branch,
            default_branch,
            on_default_branch,
            is_branch: !is_pr && !is_tag,
            is_pr,
            is_tag,
            is_schedule: kind == EventKind::Schedule,
            is_dispatch: kind == EventKind::Dispatch,
            is_release,
            is_hotfix,
            is_after_merged_release_pr,
            is_merged,
            is_closed,
            is_opened,
            commit_msg,
            commit_id,
            commit_short_id,
            pr_base_branch,
            versions,
        }
    }

    fn hotfix_prefix(&self, is_release: bool) -> String {
        if is_release {
            format!(
                "{}{}",
                self.config.release_branch_prefix, self.config.hotfix_prefix
            )
        } else {
            self.config.hotfix_prefix.clone()
        }
    }

    /// Strips the release (and nested hotfix) or tag prefix on release events.
    fn branch_version(
        &self,
        branch: &str,
        is_tag: bool,
        is_release: bool,
        is_hotfix: bool,
    ) -> String {
        if !is_release {
            return branch.to_string();
        }
        let prefix = if is_tag {
            self.config.tag_prefix.clone()
        } else if is_hotfix {
            self.hotfix_prefix(true)
        } else {
            self.config.release_branch_prefix.clone()
        };
        branch.strip_prefix(prefix.as_str()).unwrap_or(branch).to_string()
    }
}
