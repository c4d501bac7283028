use std::path::Path;

use wxmerge_core::{StalenessLevel, WeatherAggregator, WxmergeConfig};

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::CommandOutput;

pub async fn run(args: &FetchArgs, config_path: &Path) -> Result<CommandOutput, CliError> {
    let config = WxmergeConfig::load_from_path(config_path)?;
    let airport = config.airport(&args.airport)?;
    let aggregator = WeatherAggregator::builder(config.engine).build()?;

    let merged = aggregator.aggregate(airport).await;
    let failed = merged
        .sources
        .iter()
        .filter(|report| report.message.is_some())
        .count();
    tracing::info!(
        airport = %merged.airport,
        overall = merged.overall.level.as_str(),
        failed_sources = failed,
        "aggregation complete"
    );

    let fail_closed = merged.overall.level == StalenessLevel::FailClosed;
    let output = CommandOutput::ok(serde_json::to_value(&merged)?);
    if args.strict && fail_closed {
        return Ok(output.with_failure(CliError::FailClosed {
            airport: merged.airport,
        }));
    }
    Ok(output)
}
