use serde::Serialize;

use wxmerge_core::{AdapterRegistry, Field, SourceCapabilities, SourceKind};

use crate::cli::SourcesArgs;
use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct SourceSummary {
    id: SourceKind,
    wire_format: &'static str,
    auth: &'static str,
    update_frequency_secs: u64,
    max_acceptable_age_secs: u64,
    authoritative_for: &'static [Field],
    nearby_stations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'static [Field]>,
}

impl SourceSummary {
    fn new(capabilities: SourceCapabilities, verbose: bool) -> Self {
        Self {
            id: capabilities.kind,
            wire_format: capabilities.wire_format,
            auth: capabilities.auth,
            update_frequency_secs: capabilities.update_frequency_secs,
            max_acceptable_age_secs: capabilities.max_acceptable_age_secs(),
            authoritative_for: capabilities.preferred_fields,
            nearby_stations: capabilities.nearby_stations,
            fields: verbose.then_some(capabilities.fields),
        }
    }
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    sources: Vec<SourceSummary>,
}

pub fn run(args: &SourcesArgs) -> Result<CommandOutput, CliError> {
    let sources = AdapterRegistry::default()
        .capabilities()
        .into_iter()
        .map(|capabilities| SourceSummary::new(capabilities, args.verbose))
        .collect::<Vec<_>>();

    let data = serde_json::to_value(SourcesResponseData { sources })?;
    Ok(CommandOutput::ok(data))
}
