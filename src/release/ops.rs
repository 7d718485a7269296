//! Fixing and upgrading the project version.

use anyhow::Result;
use tracing::{info, info_span, warn, Instrument};

use super::context::Versions;
use crate::error::ReleaseError;
use crate::event::RuntimeContext;
use crate::version::{NextVersionMode, VersionParser, VersionResult, VersionStrategy};

/// Outcome of [`ReleaseVersionOps::fix`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedResult {
    /// Project files disagreed with the release version.
    pub must_fix_version: bool,
    /// The release pull request was merged and needs a tag.
    pub need_tag: bool,
    /// The release lives on a branch and needs a pull request.
    pub need_pull_request: bool,
    /// Versions after fixing.
    pub versions: Versions,
}

/// Outcome of [`ReleaseVersionOps::upgrade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeResult {
    /// Project files were moved to the next version.
    pub need_upgrade: bool,
    /// Versions before upgrading.
    pub versions: Versions,
    /// Version the files were moved to.
    pub next_version: Option<String>,
}

/// Version operations of a release run.
#[derive(Debug, Clone)]
pub struct ReleaseVersionOps {
    strategy: VersionStrategy,
}

impl ReleaseVersionOps {
    /// Creates the operations over a version strategy.
    pub fn new(strategy: VersionStrategy) -> Self {
        Self { strategy }
    }

    /// Returns the version strategy.
    pub fn strategy(&self) -> &VersionStrategy {
        &self.strategy
    }

    /// Aligns project files with the version named by the release branch or tag.
    ///
    /// Tags and merged release pull requests are only checked: a mismatch there
    /// fails with [`ReleaseError::TagVersionMismatch`] or
    /// [`ReleaseError::PrematureMerge`] and nothing is written.
    pub async fn fix(&self, ctx: &RuntimeContext, dry_run: bool) -> Result<FixedResult> {
        let span = info_span!("fix_version", branch = %ctx.branch);
        async {
            let check_only = dry_run || ctx.is_tag || ctx.is_merged;
            let result = self.fix_version(&ctx.versions.branch, check_only).await?;

            if result.is_changed && ctx.is_tag {
                return Err(ReleaseError::TagVersionMismatch {
                    files: result.files,
                }
                .into());
            }
            if result.is_changed && ctx.is_merged {
                return Err(ReleaseError::PrematureMerge {
                    files: result.files,
                }
                .into());
            }

            Ok(FixedResult {
                must_fix_version: result.is_changed,
                need_tag: ctx.is_merged,
                need_pull_request: ctx.is_branch,
                versions: self.versions(ctx, &result.version),
            })
        }
        .instrument(span)
        .await
    }

    /// Moves project files to the next version once a release has shipped.
    ///
    /// Without `should_bump` only the current version is read. A `NONE` mode,
    /// a current version that is not semver, or a bump equal to the current
    /// version leave the files untouched.
    pub async fn upgrade(
        &self,
        ctx: &RuntimeContext,
        should_bump: bool,
        dry_run: bool,
    ) -> Result<UpgradeResult> {
        let span = info_span!("upgrade_version", branch = %ctx.branch);
        async {
            let found =
                VersionParser::search(&self.strategy.version_patterns, &ctx.versions.branch).await?;
            info!(version = %found.version, "Current version");
            let versions = self.versions(ctx, &found.version);

            let skip = UpgradeResult {
                need_upgrade: false,
                versions: versions.clone(),
                next_version: None,
            };
            if !should_bump {
                return Ok(skip);
            }
            if self.strategy.next_version_mode == NextVersionMode::None {
                info!("No next version mode, skipping upgrade");
                return Ok(skip);
            }
            let Some(next_version) = versions.bumped.clone() else {
                warn!(current = %versions.current, "Unknown next version, skipping upgrade");
                return Ok(skip);
            };
            if next_version == versions.current {
                info!(version = %next_version, "Next version equals current, skipping upgrade");
                return Ok(skip);
            }

            let result = self.fix_version(&next_version, dry_run).await?;
            Ok(UpgradeResult {
                need_upgrade: result.is_changed,
                versions,
                next_version: Some(next_version),
            })
        }
        .instrument(span)
        .await
    }

    fn versions(&self, ctx: &RuntimeContext, current: &str) -> Versions {
        Versions::compute(&ctx.versions.branch, current, self.strategy.next_version_mode)
    }

    async fn fix_version(&self, expected: &str, dry_run: bool) -> Result<VersionResult> {
        info!(version = %expected, dry_run, "Fixing version");
        let result =
            VersionParser::replace(&self.strategy.version_patterns, expected, dry_run).await?;
        info!(count = result.files.len(), files = ?result.files, "Fixed files");
        Ok(result)
    }
}
