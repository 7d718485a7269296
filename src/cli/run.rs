//! `run` command.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use super::{ConfigArgs, EventArgs};
use crate::output::write_step_outputs;
use crate::release::ProjectOps;

/// Processes the triggering event end to end.
#[derive(Parser, Debug)]
pub struct RunCommand {
    /// Triggering event.
    #[command(flatten)]
    pub event: EventArgs,

    /// Project configuration.
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl RunCommand {
    /// Executes the run command.
    pub async fn execute(self) -> Result<()> {
        let (config, runner) = self.config.load()?;
        let event = self.event.event()?;
        let ops = ProjectOps::from_config(&config, &runner)?;

        let context = ops.process(&event, config.dry_run).await?;

        let json = serde_json::to_string_pretty(&context).context("Failed to serialize context")?;
        println!("{json}");
        if write_step_outputs(&context)? {
            info!("Step outputs written");
        }
        Ok(())
    }
}
