use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] wxmerge_core::ConfigError),

    #[error(transparent)]
    Validation(#[from] wxmerge_core::ValidationError),

    #[error("airport '{airport}' has no usable data")]
    FailClosed { airport: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 2,
            Self::FailClosed { .. } => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_problems_exit_with_two() {
        let error = CliError::from(wxmerge_core::ConfigError::UnknownAirport(String::from("KXYZ")));
        assert_eq!(error.exit_code(), 2);
        assert!(error.to_string().contains("KXYZ"));
    }

    #[test]
    fn fail_closed_exits_with_three() {
        let error = CliError::FailClosed {
            airport: String::from("KSPB"),
        };
        assert_eq!(error.exit_code(), 3);
    }
}
