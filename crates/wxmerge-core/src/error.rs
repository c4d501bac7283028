use std::path::PathBuf;

use thiserror::Error;

/// Validation and contract errors exposed by `wxmerge-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown source type '{value}'")]
    UnknownSourceType { value: String },
    #[error("unknown field '{value}'")]
    UnknownField { value: String },

    #[error("airport id cannot be empty")]
    EmptyAirportId,
    #[error("airport '{airport}' has no configured sources")]
    NoSources { airport: String },
    #[error("source #{index} for airport '{airport}' has an empty type")]
    EmptySourceType { airport: String, index: usize },

    #[error("outage threshold must be greater than zero")]
    ZeroOutageThreshold,
    #[error("circuit breaker failure threshold must be greater than zero")]
    ZeroFailureThreshold,
}

/// Errors raised while resolving configuration. These are the only errors
/// that abort an aggregation, and they are raised before it starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("airport '{0}' is not configured")]
    UnknownAirport(String),
}
