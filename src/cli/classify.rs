//! `classify` command.

use anyhow::{Context, Result};
use clap::Parser;

use super::{ConfigArgs, EventArgs};
use crate::event::GitParser;

/// Prints the runtime context of the triggering event.
#[derive(Parser, Debug)]
pub struct ClassifyCommand {
    /// Triggering event.
    #[command(flatten)]
    pub event: EventArgs,

    /// Project configuration.
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ClassifyCommand {
    /// Executes the classify command.
    pub fn execute(self) -> Result<()> {
        let (config, _runner) = self.config.load()?;
        let parser = GitParser::new(config.parser)?;
        let runtime = parser.classify(&self.event.event()?);

        let json = serde_json::to_string_pretty(&runtime).context("Failed to serialize context")?;
        println!("{json}");
        Ok(())
    }
}
