//! Searching and rewriting versions in files matched by version patterns.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pattern::VersionPattern;

/// Outcome of a search or replace over one or more version patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResult {
    /// Whether any file differs from the expected version.
    pub is_changed: bool,
    /// Files that changed (or would change in dry-run).
    pub files: Vec<String>,
    /// The version found or written.
    pub version: String,
}

impl VersionResult {
    /// Merges two results: changed if either changed, files concatenated,
    /// last non-empty version wins.
    #[must_use]
    pub fn merge(self, next: Self) -> Self {
        let mut files = self.files;
        files.extend(next.files);
        Self {
            is_changed: self.is_changed || next.is_changed,
            files,
            version: if next.version.is_empty() {
                self.version
            } else {
                next.version
            },
        }
    }
}

/// Rewrites the version inside `matched`, the text of one match of `pattern`.
///
/// When `pattern` re-matches the whole of `matched`, the synthetic group 0 is
/// skipped and `group` counts the explicit capture groups from zero. Group 0
/// then replaces the entire match; any other group is substituted while the
/// remaining captured groups are kept in order.
pub fn apply_capture(matched: &str, pattern: &Regex, group: usize, replacement: &str) -> String {
    let Some(caps) = pattern.captures(matched) else {
        return matched.to_string();
    };

    let skip_first = caps.get(0).map(|m| m.as_str()) == Some(matched);
    if group == 0 && skip_first {
        return replacement.to_string();
    }

    let target = if skip_first { group + 1 } else { group };
    caps.iter()
        .enumerate()
        .filter(|(i, _)| !(skip_first && *i == 0))
        .map(|(i, m)| {
            if i == target {
                replacement
            } else {
                m.map_or("", |m| m.as_str())
            }
        })
        .collect()
}

/// Extracts the version from `matched` using the same group rule as [`apply_capture`].
pub fn search_match(matched: &str, pattern: &Regex, group: usize) -> Option<String> {
    let caps = pattern.captures(matched)?;
    let skip_first = caps.get(0).map(|m| m.as_str()) == Some(matched);
    if group == 0 && skip_first {
        return Some(matched.to_string());
    }

    let index = if skip_first { group + 1 } else { group };
    caps.get(index).map(|m| m.as_str().to_string())
}

/// Search and replace across a list of version patterns.
pub struct VersionParser;

impl VersionParser {
    /// Rewrites every pattern's files to `version`.
    ///
    /// Patterns run concurrently; results merge in declaration order.
    pub async fn replace(
        patterns: &[VersionPattern],
        version: &str,
        dry_run: bool,
    ) -> Result<VersionResult> {
        let results =
            try_join_all(patterns.iter().map(|p| replace_pattern(p, version, dry_run))).await?;

        let initial = VersionResult {
            version: version.to_string(),
            ..VersionResult::default()
        };
        Ok(results.into_iter().fold(initial, VersionResult::merge))
    }

    /// Reads the current version: the first non-empty value across patterns, else `fallback`.
    pub async fn search(patterns: &[VersionPattern], fallback: &str) -> Result<VersionResult> {
        let found = try_join_all(patterns.iter().map(search_pattern)).await?;

        let version = found
            .into_iter()
            .flatten()
            .next()
            .unwrap_or_else(|| fallback.to_string());

        Ok(VersionResult {
            is_changed: false,
            files: Vec::new(),
            version,
        })
    }
}

async fn replace_pattern(
    pattern: &VersionPattern,
    version: &str,
    dry_run: bool,
) -> Result<VersionResult> {
    let mut changed = Vec::new();

    for file in &pattern.files {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read version file: {}", file.display()))?;

        let Some(found) = pattern.pattern.find(&content) else {
            continue;
        };

        let rewritten = apply_capture(found.as_str(), &pattern.pattern, pattern.group, version);
        if rewritten == found.as_str() {
            continue;
        }

        debug!(
            file = %file.display(),
            from = %found.as_str(),
            to = %rewritten,
            dry_run,
            "Version differs"
        );

        if !dry_run {
            let updated = format!(
                "{}{}{}",
                &content[..found.start()],
                rewritten,
                &content[found.end()..]
            );
            tokio::fs::write(file, updated)
                .await
                .with_context(|| format!("Failed to write version file: {}", file.display()))?;
            info!(file = %file.display(), version = %version, "Updated version");
        }

        changed.push(file.display().to_string());
    }

    Ok(VersionResult {
        is_changed: !changed.is_empty(),
        files: changed,
        version: version.to_string(),
    })
}

async fn search_pattern(pattern: &VersionPattern) -> Result<Option<String>> {
    for file in &pattern.files {
        let content = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read version file: {}", file.display()))?;

        let found = pattern
            .pattern
            .find(&content)
            .and_then(|m| search_match(m.as_str(), &pattern.pattern, pattern.group))
            .filter(|v| !v.is_empty());

        if let Some(version) = found {
            debug!(file = %file.display(), version = %version, "Found version");
            return Ok(Some(version));
        }
    }

    Ok(None)
}
