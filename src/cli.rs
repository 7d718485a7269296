//! CLI interface for release-pilot.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::config::ProjectConfig;
use crate::event::{EventPayload, GitEvent};
use crate::github::RunnerEnv;
use crate::utils::get_env_vars;
use crate::version::NextVersionMode;

pub mod classify;
pub mod run;
pub mod version;

/// release-pilot: semantic version lifecycle for Git and pull request events.
#[derive(Parser)]
#[command(name = "release-pilot")]
#[command(
    about = "Classifies CI events, keeps project versions in line and decides build/publish",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Processes the triggering event: fix or upgrade the version, commit, tag and decide.
    Run(run::RunCommand),
    /// Prints the runtime context of the triggering event without side effects.
    Classify(classify::ClassifyCommand),
    /// Version file and arithmetic helpers.
    Version(version::VersionCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Classify(cmd) => cmd.execute(),
            Commands::Version(cmd) => cmd.execute().await,
        }
    }
}

/// Project configuration: file location plus per-field overrides.
///
/// Every override also reads the matching GitHub Actions input (`INPUT_*`).
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Repository working copy.
    #[arg(long, env = "GITHUB_WORKSPACE", value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Configuration file (defaults to .release-pilot.yml in the workspace).
    #[arg(long, env = "INPUT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Fallback default branch.
    #[arg(long, env = "INPUT_DEFAULTBRANCH")]
    pub default_branch: Option<String>,

    /// Release tag prefix.
    #[arg(long, env = "INPUT_TAGPREFIX")]
    pub tag_prefix: Option<String>,

    /// Release branch prefix.
    #[arg(long, env = "INPUT_RELEASEBRANCHPREFIX")]
    pub release_branch_prefix: Option<String>,

    /// Hotfix branch prefix.
    #[arg(long, env = "INPUT_HOTFIXPREFIX")]
    pub hotfix_prefix: Option<String>,

    /// Regex matching the merge commit of a release pull request.
    #[arg(long, env = "INPUT_MERGEDRELEASEMSGREGEX")]
    pub merged_release_msg_regex: Option<String>,

    /// Length of the abbreviated commit SHA.
    #[arg(long, env = "INPUT_SHORTCOMMITSHALENGTH")]
    pub sha_length: Option<usize>,

    /// Component bumped after a release: MAJOR, MINOR, PATCH or NONE.
    #[arg(long, env = "INPUT_NEXTVERMODE")]
    pub next_version_mode: Option<String>,

    /// Version patterns, `<glob>::<regex>::<group>` separated by commas or newlines.
    #[arg(long, env = "INPUT_VERSIONPATTERNS")]
    pub version_patterns: Option<String>,

    /// Detect and report without writing files or touching git.
    #[arg(long, env = "INPUT_DRYRUN", num_args = 0..=1, default_missing_value = "true")]
    pub dry_run: Option<bool>,

    /// Allow committing version changes.
    #[arg(long, env = "INPUT_ALLOWCOMMIT")]
    pub allow_commit: Option<bool>,

    /// Allow tagging merged releases.
    #[arg(long, env = "INPUT_ALLOWTAG")]
    pub allow_tag: Option<bool>,

    /// GPG-sign commits and tags.
    #[arg(long, env = "INPUT_MUSTSIGN")]
    pub must_sign: Option<bool>,

    /// Prefix of automated commit messages.
    #[arg(long, env = "INPUT_PREFIXCIMSG")]
    pub prefix_ci_msg: Option<String>,

    /// Version correction commit message.
    #[arg(long, env = "INPUT_CORRECTVERMSG")]
    pub correct_ver_msg: Option<String>,

    /// Release tag message.
    #[arg(long, env = "INPUT_RELEASEVERMSG")]
    pub release_ver_msg: Option<String>,

    /// Next version commit message.
    #[arg(long, env = "INPUT_NEXTVERMSG")]
    pub next_ver_msg: Option<String>,

    /// Committer name when the repository has none.
    #[arg(long, env = "INPUT_GITUSERNAME")]
    pub user_name: Option<String>,

    /// Committer email when the repository has none.
    #[arg(long, env = "INPUT_GITUSEREMAIL")]
    pub user_email: Option<String>,

    /// Generate a changelog on release branches.
    #[arg(long, env = "INPUT_CHANGELOG")]
    pub changelog: Option<bool>,

    /// Changelog generator image.
    #[arg(long, env = "INPUT_CHANGELOGIMAGE")]
    pub changelog_image: Option<String>,

    /// Changelog generator params file.
    #[arg(long, env = "INPUT_CHANGELOGCONFIGFILE")]
    pub changelog_config_file: Option<String>,

    /// Changelog commit message.
    #[arg(long, env = "INPUT_CHANGELOGMSG")]
    pub changelog_msg: Option<String>,

    /// Token the changelog generator uses.
    #[arg(long, env = "INPUT_CHANGELOGTOKEN", hide_env_values = true)]
    pub changelog_token: Option<String>,

    /// GitHub token; falls back to GITHUB_TOKEN and the settings file.
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl ConfigArgs {
    /// Reads the runner environment and the configuration file, then applies overrides.
    pub fn load(&self) -> Result<(ProjectConfig, RunnerEnv)> {
        let mut runner = RunnerEnv::from_env();
        if let Some(workspace) = &self.workspace {
            runner.workspace.clone_from(workspace);
        }

        let path = self
            .config
            .as_ref()
            .map_or_else(
                || ProjectConfig::default_path(&runner.workspace),
                |p| runner.workspace.join(p),
            );
        debug!(path = %path.display(), "Loading configuration");
        let mut config = ProjectConfig::load_from_path(&path)?;
        self.apply(&mut config);

        config.token = self
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| get_env_vars(&["GITHUB_TOKEN"]));

        Ok((config, runner))
    }

    /// Overwrites `config` fields that were given on the command line or as inputs.
    pub fn apply(&self, config: &mut ProjectConfig) {
        fn set<T: Clone>(target: &mut T, value: Option<&T>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        set(&mut config.parser.default_branch, non_empty(&self.default_branch).as_ref());
        set(&mut config.parser.tag_prefix, self.tag_prefix.as_ref());
        set(
            &mut config.parser.release_branch_prefix,
            non_empty(&self.release_branch_prefix).as_ref(),
        );
        set(&mut config.parser.hotfix_prefix, non_empty(&self.hotfix_prefix).as_ref());
        set(
            &mut config.parser.merged_release_msg_regex,
            non_empty(&self.merged_release_msg_regex).as_ref(),
        );
        set(&mut config.parser.sha_length, self.sha_length.as_ref());

        if let Some(mode) = non_empty(&self.next_version_mode) {
            config.version.next_version_mode = mode.parse::<NextVersionMode>().unwrap_or_default();
        }
        if let Some(patterns) = non_empty(&self.version_patterns) {
            config.version.patterns = Some(patterns);
        }
        set(&mut config.dry_run, self.dry_run.as_ref());

        set(&mut config.git.allow_commit, self.allow_commit.as_ref());
        set(&mut config.git.allow_tag, self.allow_tag.as_ref());
        set(&mut config.git.must_sign, self.must_sign.as_ref());
        set(&mut config.git.prefix_ci_msg, non_empty(&self.prefix_ci_msg).as_ref());
        set(&mut config.git.correct_ver_msg, non_empty(&self.correct_ver_msg).as_ref());
        set(&mut config.git.release_ver_msg, non_empty(&self.release_ver_msg).as_ref());
        set(&mut config.git.next_ver_msg, non_empty(&self.next_ver_msg).as_ref());
        set(&mut config.git.user_name, non_empty(&self.user_name).as_ref());
        set(&mut config.git.user_email, non_empty(&self.user_email).as_ref());

        set(&mut config.changelog.active, self.changelog.as_ref());
        set(&mut config.changelog.image, non_empty(&self.changelog_image).as_ref());
        set(&mut config.changelog.config_file, non_empty(&self.changelog_config_file).as_ref());
        set(&mut config.changelog.commit_msg, non_empty(&self.changelog_msg).as_ref());
        if let Some(token) = non_empty(&self.changelog_token) {
            config.changelog.token = Some(token);
        }
    }
}

/// The triggering event, as exposed by the GitHub Actions runner.
#[derive(Args, Debug, Default)]
pub struct EventArgs {
    /// Event name such as push or pull_request.
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub event_name: String,

    /// Fully qualified ref.
    #[arg(long = "ref", env = "GITHUB_REF", default_value = "")]
    pub ref_name: String,

    /// Triggering commit SHA.
    #[arg(long, env = "GITHUB_SHA", default_value = "")]
    pub sha: String,

    /// Webhook payload JSON file.
    #[arg(long, env = "GITHUB_EVENT_PATH", value_name = "FILE")]
    pub event_path: Option<PathBuf>,
}

impl EventArgs {
    /// Builds the event, reading the payload file when one is given.
    pub fn event(&self) -> Result<GitEvent> {
        match self.event_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => GitEvent::from_file(&self.event_name, &self.ref_name, &self.sha, path),
            None => Ok(GitEvent {
                event_name: self.event_name.clone(),
                ref_name: self.ref_name.clone(),
                sha: self.sha.clone(),
                payload: EventPayload::default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_replace_file_values() {
        let args = ConfigArgs {
            default_branch: Some("master".to_string()),
            tag_prefix: Some(String::new()),
            next_version_mode: Some("minor".to_string()),
            version_patterns: Some("VERSION".to_string()),
            allow_tag: Some(false),
            changelog: Some(true),
            user_name: Some(String::new()),
            ..ConfigArgs::default()
        };
        let mut config = ProjectConfig::default();
        args.apply(&mut config);

        assert_eq!(config.parser.default_branch, "master");
        assert_eq!(config.parser.tag_prefix, "");
        assert_eq!(config.version.next_version_mode, NextVersionMode::Minor);
        assert_eq!(config.version.patterns.as_deref(), Some("VERSION"));
        assert!(!config.git.allow_tag);
        assert!(config.git.allow_commit);
        assert!(config.changelog.active);
        assert_eq!(config.git.user_name, "ci-bot");
    }

    #[test]
    fn event_without_payload_file() {
        let args = EventArgs {
            event_name: "schedule".to_string(),
            ref_name: "refs/heads/main".to_string(),
            ..EventArgs::default()
        };
        let event = args.event().unwrap();
        assert_eq!(event.event_name, "schedule");
        assert_eq!(event.payload, EventPayload::default());
    }
}
