mod fetch;
mod sources;

use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Rendered payload plus an error to report after printing it.
pub struct CommandOutput {
    pub data: Value,
    pub failure: Option<CliError>,
}

impl CommandOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            failure: None,
        }
    }

    pub fn with_failure(mut self, failure: CliError) -> Self {
        self.failure = Some(failure);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    match &cli.command {
        Command::Fetch(args) => fetch::run(args, &cli.config).await,
        Command::Sources(args) => sources::run(args),
    }
}
