//! Serde model of the webhook event that triggered a run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Repository section of an event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPayload {
    /// Repository default branch.
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// A branch reference inside a pull request payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// Branch name.
    #[serde(default, rename = "ref")]
    pub ref_name: Option<String>,
    /// Commit SHA at the tip of the branch.
    #[serde(default)]
    pub sha: Option<String>,
}

/// Pull request section of an event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestPayload {
    /// Source branch.
    #[serde(default)]
    pub head: PullRequestRef,
    /// Target branch.
    #[serde(default)]
    pub base: PullRequestRef,
    /// Whether the pull request was merged.
    #[serde(default)]
    pub merged: Option<bool>,
}

/// Head commit of a push payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadCommitPayload {
    /// Full commit message.
    #[serde(default)]
    pub message: Option<String>,
}

/// The subset of the webhook payload used for classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Pull request action (`opened`, `closed`, ...).
    #[serde(default)]
    pub action: Option<String>,
    /// Repository metadata.
    #[serde(default)]
    pub repository: Option<RepositoryPayload>,
    /// Present on `pull_request` events.
    #[serde(default)]
    pub pull_request: Option<PullRequestPayload>,
    /// Present on `push` events.
    #[serde(default)]
    pub head_commit: Option<HeadCommitPayload>,
}

/// A triggering event: name, ref, commit and payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitEvent {
    /// Event name such as `push` or `pull_request`.
    pub event_name: String,
    /// Fully qualified ref, e.g. `refs/heads/main`.
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Commit SHA that triggered the event.
    pub sha: String,
    /// Webhook payload.
    #[serde(default)]
    pub payload: EventPayload,
}

impl GitEvent {
    /// Builds an event from a payload JSON file.
    pub fn from_file<P: AsRef<Path>>(
        event_name: &str,
        ref_name: &str,
        sha: &str,
        path: P,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read event payload: {}", path.display()))?;
        let payload = serde_json::from_str::<EventPayload>(&content)
            .with_context(|| format!("Failed to parse event payload: {}", path.display()))?;

        Ok(Self {
            event_name: event_name.to_string(),
            ref_name: ref_name.to_string(),
            sha: sha.to_string(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pull_request_payload() {
        let payload: EventPayload = serde_json::from_value(serde_json::json!({
            "action": "closed",
            "number": 16,
            "pull_request": {
                "head": { "ref": "release/1.0.6", "sha": "1584df02" },
                "base": { "ref": "main", "sha": "aaaa" },
                "merged": true,
                "title": "Release 1.0.6"
            },
            "repository": { "default_branch": "main", "full_name": "zero88/demo" }
        }))
        .unwrap();

        let pr = payload.pull_request.unwrap();
        assert_eq!(payload.action.as_deref(), Some("closed"));
        assert_eq!(pr.head.ref_name.as_deref(), Some("release/1.0.6"));
        assert_eq!(pr.base.ref_name.as_deref(), Some("main"));
        assert_eq!(pr.merged, Some(true));
        assert_eq!(
            payload.repository.unwrap().default_branch.as_deref(),
            Some("main")
        );
    }

    #[test]
    fn reads_payload_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, r#"{"head_commit": {"message": "Update README"}}"#).unwrap();

        let event = GitEvent::from_file("push", "refs/heads/main", "abc", &path).unwrap();
        assert_eq!(event.event_name, "push");
        assert_eq!(
            event.payload.head_commit.unwrap().message.as_deref(),
            Some("Update README")
        );
    }
}
