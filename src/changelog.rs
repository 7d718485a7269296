//! Changelog generation through the github-changelog-generator Docker image.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::github::RunnerEnv;
use crate::release::CommitStatus;

const CONTAINER_WORKDIR: &str = "/github/workspace";
const DEFAULT_CHANGELOG_FILE: &str = "CHANGELOG.md";

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static OUTPUT_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:base|output)\s?=\s?(.+)$").unwrap());

/// Changelog generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangelogConfig {
    /// Generate a changelog on release branches.
    pub active: bool,
    /// Generator image.
    pub image: String,
    /// Generator params file, relative to the workspace.
    pub config_file: String,
    /// Commit message prefix; the release tag is appended.
    pub commit_msg: String,
    /// Token the generator uses to query GitHub.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            active: false,
            image: "githubchangeloggenerator/github-changelog-generator:1.16.2".to_string(),
            config_file: ".github_changelog_generator".to_string(),
            commit_msg: "Generated CHANGELOG".to_string(),
            token: None,
        }
    }
}

/// What the generator produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedResult {
    /// The changelog file was written.
    pub generated: bool,
    /// Previous release tag, if any.
    pub since_tag: Option<String>,
    /// Release tag being generated.
    pub release_tag: String,
    /// Message to commit the changelog with.
    pub commit_msg: Option<String>,
}

/// Changelog outcome reported in the run output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogResult {
    /// The changelog file was written.
    pub generated: bool,
    /// Previous release tag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_tag: Option<String>,
    /// Release tag.
    pub release_tag: String,
    /// The changelog was committed.
    pub is_committed: bool,
    /// Changelog commit id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    /// Changelog commit message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_msg: Option<String>,
}

impl ChangelogResult {
    /// Combines a generation result with the status of committing it.
    pub fn new(generated: GeneratedResult, status: &CommitStatus) -> Self {
        Self {
            generated: generated.generated,
            since_tag: generated.since_tag,
            release_tag: generated.release_tag,
            is_committed: status.is_committed,
            commit_id: status.commit_id.clone(),
            commit_msg: status.commit_msg.clone().or(generated.commit_msg),
        }
    }
}

/// Produces a changelog for a release.
pub trait ChangelogGenerator: Send + Sync {
    /// Generates the changelog of `release_tag` since `since_tag`.
    fn generate(
        &self,
        since_tag: Option<&str>,
        release_tag: &str,
        release_branch: Option<&str>,
        dry_run: bool,
    ) -> Result<GeneratedResult>;
}

/// Runs github-changelog-generator in Docker against the workspace.
pub struct DockerChangelog {
    config: ChangelogConfig,
    runner: RunnerEnv,
    program: String,
}

impl DockerChangelog {
    /// Creates a generator for the runner's workspace and repository.
    pub fn new(config: ChangelogConfig, runner: RunnerEnv) -> Self {
        Self {
            config,
            runner,
            program: "docker".to_string(),
        }
    }

    /// Runs `program` instead of `docker`, e.g. `podman`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Whether `release_tag` already appears in the changelog output file.
    pub fn verify_exists(&self, release_tag: &str) -> Result<bool> {
        let workspace = &self.runner.workspace;
        for file in changelog_files(workspace, &self.config.config_file) {
            if !file.is_file() {
                continue;
            }
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read changelog: {}", file.display()))?;
            if content.contains(release_tag) {
                debug!(file = %file.display(), release_tag, "Release already in changelog");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Arguments of the `docker run` invocation.
    pub fn docker_args(
        &self,
        since_tag: Option<&str>,
        release_tag: &str,
        release_branch: Option<&str>,
    ) -> Vec<String> {
        let mut args: Vec<String> = ["run", "-t", "--rm", "--workdir", CONTAINER_WORKDIR]
            .into_iter()
            .map(str::to_string)
            .collect();
        for var in [
            "CI",
            "GITHUB_API_URL",
            "GITHUB_SERVER_URL",
            "GITHUB_WORKSPACE",
            "CHANGELOG_GITHUB_TOKEN",
        ] {
            args.extend(["-e".to_string(), var.to_string()]);
        }
        args.extend([
            "-v".to_string(),
            format!("{}:{CONTAINER_WORKDIR}", self.runner.workspace.display()),
            self.config.image.clone(),
        ]);

        let mut push = |flag: &str, value: &str| {
            args.extend([flag.to_string(), value.to_string()]);
        };
        push("--user", &self.runner.owner);
        push("--project", &self.runner.repo);
        push("--config-file", &self.config.config_file);
        if let Some(since) = since_tag {
            push("--since-tag", since);
        }
        push("--future-release", release_tag);
        push("--github-api", &self.runner.api_url);
        push("--github-site", &self.runner.server_url);
        if let Some(branch) = release_branch.filter(|b| !b.is_empty()) {
            push("--release-branch", branch);
        }
        args
    }
}

impl ChangelogGenerator for DockerChangelog {
    fn generate(
        &self,
        since_tag: Option<&str>,
        release_tag: &str,
        release_branch: Option<&str>,
        dry_run: bool,
    ) -> Result<GeneratedResult> {
        let skipped = GeneratedResult {
            generated: false,
            since_tag: since_tag.map(str::to_string),
            release_tag: release_tag.to_string(),
            commit_msg: None,
        };
        if !self.config.active {
            return Ok(skipped);
        }

        let _span = info_span!("changelog", release_tag, since_tag).entered();
        if self.verify_exists(release_tag)? {
            info!("Changelog already contains the release, skipping");
            return Ok(skipped);
        }
        if dry_run {
            info!("Dry run, skipping changelog generation");
            return Ok(skipped);
        }

        let args = self.docker_args(since_tag, release_tag, release_branch);
        debug!(?args, "Running changelog generator");
        let mut command = Command::new(&self.program);
        command.args(&args);
        if let Some(token) = &self.config.token {
            command.env("CHANGELOG_GITHUB_TOKEN", token);
        }
        let output = command
            .output()
            .with_context(|| format!("Failed to execute {} run", self.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "Changelog generator failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!("Generated changelog");
        Ok(GeneratedResult {
            generated: true,
            commit_msg: Some(format!("{} {release_tag}", self.config.commit_msg)),
            ..skipped
        })
    }
}

/// Output files named by the generator params file, else `CHANGELOG.md`.
fn changelog_files(workspace: &Path, config_file: &str) -> Vec<PathBuf> {
    let content = fs::read_to_string(workspace.join(config_file)).unwrap_or_default();

    let mut files: Vec<PathBuf> = OUTPUT_ENTRY
        .captures_iter(&content)
        .filter_map(|caps| caps.get(1))
        .map(|m| workspace.join(m.as_str().trim()))
        .collect();
    if files.is_empty() {
        files.push(workspace.join(DEFAULT_CHANGELOG_FILE));
    }
    files
}
