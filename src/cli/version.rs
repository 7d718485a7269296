//! `version` commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use super::ConfigArgs;
use crate::config::ProjectConfig;
use crate::error::ReleaseError;
use crate::version::{
    bumped_version, create_next_version, find_previous_version, NextVersionMode, VersionParser,
    VersionStrategy,
};

/// Version file and arithmetic helpers.
#[derive(Parser, Debug)]
pub struct VersionCommand {
    /// Version subcommand to execute.
    #[command(subcommand)]
    pub command: VersionSubcommands,
}

/// Version subcommands.
#[derive(Subcommand, Debug)]
pub enum VersionSubcommands {
    /// Prints the version declared in project files.
    Search {
        /// Project configuration.
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Rewrites project files to a version.
    Fix {
        /// Expected version.
        version: String,

        /// Project configuration.
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Prints the next versions of a version.
    Next {
        /// Current version.
        current: String,

        /// Component to bump: MAJOR, MINOR, PATCH or NONE.
        #[arg(long, default_value = "NONE")]
        mode: String,
    },
    /// Prints the released version preceding a version.
    Previous {
        /// Current version.
        current: String,

        /// Released versions, in any order.
        #[arg(required = true)]
        candidates: Vec<String>,
    },
}

impl VersionCommand {
    /// Executes the version command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            VersionSubcommands::Search { config } => {
                let (_, strategy) = load_strategy(&config)?;
                let found = VersionParser::search(&strategy.version_patterns, "").await?;
                if found.version.is_empty() {
                    tracing::warn!("No version found in project files");
                }
                println!("{}", found.version);
            }
            VersionSubcommands::Fix { version, config } => {
                let (project, strategy) = load_strategy(&config)?;
                let result =
                    VersionParser::replace(&strategy.version_patterns, &version, project.dry_run)
                        .await?;
                print_json(&serde_json::to_value(result)?)?;
            }
            VersionSubcommands::Next { current, mode } => {
                let next = create_next_version(&current);
                let mode = mode.parse::<NextVersionMode>().unwrap_or_default();
                let bumped = bumped_version(&next, mode);
                if next.next_patch.is_none() {
                    return Err(ReleaseError::InvalidVersion(current).into());
                }
                let mut value = serde_json::to_value(next)?;
                value["bumped"] = json!(bumped);
                print_json(&value)?;
            }
            VersionSubcommands::Previous {
                current,
                candidates,
            } => {
                println!("{}", find_previous_version(&current, &candidates)?);
            }
        }
        Ok(())
    }
}

fn load_strategy(args: &ConfigArgs) -> Result<(ProjectConfig, VersionStrategy)> {
    let (config, runner) = args.load()?;
    let strategy = VersionStrategy::new(
        &runner.workspace,
        config.version.patterns.as_deref(),
        config.version.next_version_mode,
    )?;
    Ok((config, strategy))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
