//! Version pattern language: `<glob>::<regex>::<group>` entries resolved to files.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::ReleaseError;

/// Built-in patterns used when no pattern string is configured.
pub const DEFAULT_PATTERNS: &str = r#"pyproject.toml::(version\s?=\s?)(")([^"]+)(")::2
package?(-lock).json::("version"\s?:\s?)(")([^"]+)(")::2
@(gradle|maven|pom|project).properties::(version\s?=\s?)(.+)::1
@(application|version).yml::(version:\s)(.+)::1
@(VERSION|version)?(.txt)::.+::0"#;

/// A resolved version pattern: the files it applies to and how to find the version in them.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    /// Existing regular files matched by the glob, sorted.
    pub files: Vec<PathBuf>,
    /// Extension of the first matched file, with its leading dot.
    pub ext: String,
    /// Regex locating the version.
    pub pattern: Regex,
    /// Capture group holding the version, counted from zero over the explicit groups.
    pub group: usize,
}

impl VersionPattern {
    /// Parses a multi-line, comma separated pattern string.
    ///
    /// Entries whose glob matches no file are dropped. `None` selects
    /// [`DEFAULT_PATTERNS`]; an empty string yields no pattern at all.
    pub fn parse_all(base: &Path, patterns: Option<&str>) -> Result<Vec<Self>> {
        let source = patterns.unwrap_or(DEFAULT_PATTERNS);
        let mut resolved = Vec::new();
        for entry in split_entries(source) {
            if let Some(pattern) = Self::parse_entry(base, entry)? {
                resolved.push(pattern);
            }
        }
        Ok(resolved)
    }

    /// Parses one `<glob>::<regex>::<group>` entry.
    pub fn parse_entry(base: &Path, entry: &str) -> Result<Option<Self>> {
        let parts: Vec<&str> = entry.split("::").collect();
        let glob = parts[0].trim();
        if glob.is_empty() {
            return Ok(None);
        }

        let files = resolve_files(base, glob)?;
        let Some(first) = files.first() else {
            debug!(glob = %glob, "Version pattern matched no file, skipping");
            return Ok(None);
        };

        let ext = first
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".txt".to_string());

        let explicit = parts.get(1).map(|p| p.trim()).filter(|p| !p.is_empty());
        let (source, group) = match explicit {
            Some(source) => {
                let group = parts
                    .get(2)
                    .and_then(|g| g.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                (source, group)
            }
            None => default_pattern(&ext),
        };

        let pattern = compile(source)?;

        debug!(
            glob = %glob,
            ext = %ext,
            pattern = %source,
            group,
            files = files.len(),
            "Resolved version pattern"
        );

        Ok(Some(Self {
            files,
            ext,
            pattern,
            group,
        }))
    }
}

/// Compiles a version regex. CRLF mode keeps `.` and `$` from consuming a trailing `\r`.
pub fn compile(source: &str) -> Result<Regex, ReleaseError> {
    RegexBuilder::new(source)
        .crlf(true)
        .build()
        .map_err(|e| ReleaseError::InvalidPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })
}

/// Returns the default regex and group for a file extension.
pub fn default_pattern(ext: &str) -> (&'static str, usize) {
    match ext {
        ".json" => (r#"("version"\s?:\s?)(")([^"]+)(")"#, 2),
        ".properties" => (r"(version\s?=\s?)(.+)", 1),
        ".toml" => (r#"(version\s?=\s?)(")([^"]+)(")"#, 2),
        ".yaml" | ".yml" => (r"(version:\s)(.+)", 1),
        _ => (".+", 0),
    }
}

/// Splits a pattern string on newlines and commas, dropping blanks.
fn split_entries(source: &str) -> Vec<&str> {
    source
        .lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Resolves a glob to the regular files below `base` it matches.
///
/// Each extglob alternative is resolved on its own and the results are merged.
/// Wildcards skip dot files and symlinks never match.
fn resolve_files(base: &Path, glob: &str) -> Result<Vec<PathBuf>> {
    let (root, glob) = match glob.strip_prefix('/') {
        Some(absolute) => (String::from("/"), absolute),
        None => (
            format!("{}/", Pattern::escape(&base.to_string_lossy())),
            glob.trim_start_matches("./"),
        ),
    };

    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut files = BTreeSet::new();
    for expanded in expand_extglob(glob) {
        let full = format!("{root}{expanded}");
        let paths = glob_with(&full, options).map_err(|e| ReleaseError::InvalidPattern {
            pattern: expanded.clone(),
            reason: e.to_string(),
        })?;
        for entry in paths {
            let path = entry.with_context(|| format!("Failed to resolve glob {expanded}"))?;
            if fs::symlink_metadata(&path).is_ok_and(|meta| meta.is_file()) {
                files.insert(path);
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// Expands `@(a|b)` and `?(a|b)` extglob groups into plain globs.
pub fn expand_extglob(glob: &str) -> Vec<String> {
    for (i, c) in glob.char_indices() {
        if c != '@' && c != '?' {
            continue;
        }
        let open = i + 1;
        if !glob[open..].starts_with('(') {
            continue;
        }
        let Some(close) = matching_paren(glob, open) else {
            continue;
        };

        let mut alternatives = split_alternatives(&glob[open + 1..close]);
        if c == '?' {
            alternatives.push("");
        }

        let prefix = &glob[..i];
        let suffix = &glob[close + 1..];
        return alternatives
            .into_iter()
            .flat_map(|alt| expand_extglob(&format!("{prefix}{alt}{suffix}")))
            .collect();
    }

    vec![glob.to_string()]
}

fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_alternatives(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}
