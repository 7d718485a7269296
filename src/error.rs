//! Release-specific error handling.

use thiserror::Error;

/// Errors that abort a release run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    /// A pushed tag names a version that differs from the version in project files.
    #[error("Git tag version doesn't meet with current version in files. Invalid files: [{}]", .files.join(","))]
    TagVersionMismatch {
        /// Files that would have been rewritten.
        files: Vec<String>,
    },

    /// A release pull request was merged before its version was corrected.
    #[error("Merge too soon, not yet fixed version. Invalid files: [{}]", .files.join(","))]
    PrematureMerge {
        /// Files that would have been rewritten.
        files: Vec<String>,
    },

    /// A string that must be a semantic version is not one.
    #[error("Invalid version {0}")]
    InvalidVersion(String),

    /// No released version precedes the requested one.
    #[error("Not found previous version: {0}")]
    PreviousVersionNotFound(String),

    /// A version pattern regex failed to compile.
    #[error("Invalid version pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// GitHub REST API call failed.
    #[error("GitHub API request failed: {0}")]
    GitHubApi(String),
}
