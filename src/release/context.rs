//! Output model of a release run.

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::changelog::ChangelogResult;
use crate::event::RuntimeContext;
use crate::version::{bumped_version, create_next_version, NextVersionMode};

/// Versions known at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versions {
    /// Version implied by the triggering ref.
    pub branch: String,
    /// Version found in, or written to, project files.
    pub current: String,
    /// Next major version, when `current` is semver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_major: Option<String>,
    /// Next minor version, when `current` is semver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_minor: Option<String>,
    /// Next patch version, when `current` is semver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_patch: Option<String>,
    /// The next version selected by the configured mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bumped: Option<String>,
}

impl Versions {
    /// Computes the next versions of `current` and the bump selected by `mode`.
    pub fn compute(branch: &str, current: &str, mode: NextVersionMode) -> Self {
        let next = create_next_version(current);
        let bumped = bumped_version(&next, mode);
        Self {
            branch: branch.to_string(),
            current: current.to_string(),
            next_major: next.next_major,
            next_minor: next.next_minor,
            next_patch: next.next_patch,
            bumped,
        }
    }
}

/// What a run committed and pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitStatus {
    /// A commit or tag was created.
    pub is_committed: bool,
    /// Something was pushed to the remote.
    pub is_pushed: bool,
    /// Id of the created commit or tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    /// Message of the created commit or tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_msg: Option<String>,
}

impl CommitStatus {
    /// Combines two statuses; the later commit id and message win.
    #[must_use]
    pub fn merge(self, next: Self) -> Self {
        Self {
            is_committed: self.is_committed || next.is_committed,
            is_pushed: self.is_pushed || next.is_pushed,
            commit_id: next.commit_id.or(self.commit_id),
            commit_msg: next.commit_msg.or(self.commit_msg),
        }
    }
}

/// Event-specific outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum CiEvent {
    /// Release branch or unmerged release pull request.
    OnReleaseBranch {
        /// Project files had to be corrected.
        must_fix_version: bool,
        /// A release pull request should be opened.
        need_pull_request: bool,
        /// Changelog generation outcome.
        #[serde(skip_serializing_if = "Option::is_none")]
        changelog: Option<ChangelogResult>,
    },
    /// Merged release pull request or release tag.
    OnMergeReleasePR {
        /// Project files had to be corrected.
        must_fix_version: bool,
        /// A release tag should be created.
        need_tag: bool,
    },
    /// Any non-release event.
    OnNext {
        /// Project files were moved to the next version.
        need_upgrade: bool,
    },
}

/// Event outcome merged with commit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiContext {
    /// Commit and push status.
    #[serde(flatten)]
    pub status: CommitStatus,
    /// Event-specific outcome.
    #[serde(flatten)]
    pub event: CiEvent,
}

/// Whether downstream steps should build and publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Run the build.
    pub build: bool,
    /// Publish the build artifacts.
    pub publish: bool,
}

/// Runtime context extended with the outcome of the run.
///
/// Serializes as the runtime fields followed by `version`, `versions`, `ci`
/// and `decision`; `versions` replaces the runtime's branch-only view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    /// Classified event.
    pub runtime: RuntimeContext,
    /// Current project version.
    pub version: String,
    /// Version details.
    pub versions: Versions,
    /// Event outcome and commit status.
    pub ci: CiContext,
    /// Build decision.
    pub decision: Decision,
}

impl Serialize for ProjectContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(&self.runtime).map_err(S::Error::custom)?;
        if let Value::Object(map) = &mut value {
            map.insert("version".to_string(), Value::String(self.version.clone()));
            for (key, field) in [
                ("versions", serde_json::to_value(&self.versions)),
                ("ci", serde_json::to_value(&self.ci)),
                ("decision", serde_json::to_value(self.decision)),
            ] {
                map.insert(key.to_string(), field.map_err(S::Error::custom)?);
            }
        }
        value.serialize(serializer)
    }
}
