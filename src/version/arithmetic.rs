//! Semantic version arithmetic: next versions, bump selection and release history lookup.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ReleaseError;

/// Which component to advance once a release has shipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NextVersionMode {
    /// Bump the major component.
    Major,
    /// Bump the minor component.
    Minor,
    /// Bump the patch component.
    Patch,
    /// Never bump.
    #[default]
    None,
}

impl FromStr for NextVersionMode {
    type Err = Infallible;

    /// Unknown values select [`NextVersionMode::None`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "MAJOR" => Self::Major,
            "MINOR" => Self::Minor,
            "PATCH" => Self::Patch,
            _ => Self::None,
        })
    }
}

impl fmt::Display for NextVersionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "MAJOR"),
            Self::Minor => write!(f, "MINOR"),
            Self::Patch => write!(f, "PATCH"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Candidate next versions of a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextVersions {
    /// `major+1.0.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_major: Option<String>,
    /// `major.minor+1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_minor: Option<String>,
    /// `major.minor.patch+1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_patch: Option<String>,
}

/// Computes the next versions of `current`.
///
/// Empty when `current` is not semver or a component cannot be incremented.
pub fn create_next_version(current: &str) -> NextVersions {
    let Ok(v) = Version::parse(current) else {
        return NextVersions::default();
    };

    let (Some(major), Some(minor), Some(patch)) = (
        v.major.checked_add(1),
        v.minor.checked_add(1),
        v.patch.checked_add(1),
    ) else {
        return NextVersions::default();
    };

    NextVersions {
        next_major: Some(Version::new(major, 0, 0).to_string()),
        next_minor: Some(Version::new(v.major, minor, 0).to_string()),
        next_patch: Some(Version::new(v.major, v.minor, patch).to_string()),
    }
}

/// Selects the bumped version for `mode`. `None` means no bump.
pub fn bumped_version(next: &NextVersions, mode: NextVersionMode) -> Option<String> {
    match mode {
        NextVersionMode::Major => next.next_major.clone(),
        NextVersionMode::Minor => next.next_minor.clone(),
        NextVersionMode::Patch => next.next_patch.clone(),
        NextVersionMode::None => None,
    }
}

/// Finds the greatest candidate that precedes `current`.
///
/// Candidates equal in precedence are ordered by build metadata, the lesser
/// build being the previous one. Unparseable candidates are ignored.
pub fn find_previous_version<S: AsRef<str>>(
    current: &str,
    candidates: &[S],
) -> Result<String, ReleaseError> {
    if candidates.is_empty() {
        return Err(ReleaseError::PreviousVersionNotFound(
            "Required a list of versions".to_string(),
        ));
    }

    let current_version =
        Version::parse(current).map_err(|_| ReleaseError::InvalidVersion(current.to_string()))?;

    candidates
        .iter()
        .filter_map(|c| Version::parse(c.as_ref()).ok().map(|v| (v, c.as_ref())))
        .filter(|(v, _)| match current_version.cmp_precedence(v) {
            Ordering::Greater => true,
            Ordering::Equal => current_version.build > v.build,
            Ordering::Less => false,
        })
        .max_by(|(a, _), (b, _)| a.cmp_precedence(b).then_with(|| b.build.cmp(&a.build)))
        .map(|(_, raw)| raw.to_string())
        .ok_or_else(|| ReleaseError::PreviousVersionNotFound(current.to_string()))
}
