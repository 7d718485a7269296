//! Version discovery, rewriting and arithmetic.

use std::path::Path;

use anyhow::Result;

pub mod arithmetic;
pub mod parser;
pub mod pattern;

pub use arithmetic::{
    bumped_version, create_next_version, find_previous_version, NextVersionMode, NextVersions,
};
pub use parser::{apply_capture, search_match, VersionParser, VersionResult};
pub use pattern::{VersionPattern, DEFAULT_PATTERNS};

/// How a project declares its version and how it moves to the next one.
#[derive(Debug, Clone)]
pub struct VersionStrategy {
    /// Component bumped after a release ships.
    pub next_version_mode: NextVersionMode,
    /// Resolved version patterns, in declaration order.
    pub version_patterns: Vec<VersionPattern>,
}

impl VersionStrategy {
    /// Resolves `patterns` (or the built-in defaults when `None`) against `base`.
    pub fn new(
        base: &Path,
        patterns: Option<&str>,
        next_version_mode: NextVersionMode,
    ) -> Result<Self> {
        let version_patterns = VersionPattern::parse_all(base, patterns)?;
        Ok(Self {
            next_version_mode,
            version_patterns,
        })
    }
}
