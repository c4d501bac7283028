use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical upstream source identifiers used in readings, provenance, and
/// circuit breaker keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Tempest,
    Ambient,
    Weatherlink,
    Pwsweather,
    Synopticdata,
    Metar,
    MetarText,
    Nws,
    Swob,
    Openmeteo,
    Ecowitt,
    Federated,
}

impl SourceKind {
    pub const ALL: [Self; 12] = [
        Self::Tempest,
        Self::Ambient,
        Self::Weatherlink,
        Self::Pwsweather,
        Self::Synopticdata,
        Self::Metar,
        Self::MetarText,
        Self::Nws,
        Self::Swob,
        Self::Openmeteo,
        Self::Ecowitt,
        Self::Federated,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tempest => "tempest",
            Self::Ambient => "ambient",
            Self::Weatherlink => "weatherlink",
            Self::Pwsweather => "pwsweather",
            Self::Synopticdata => "synopticdata",
            Self::Metar => "metar",
            Self::MetarText => "metar_text",
            Self::Nws => "nws",
            Self::Swob => "swob",
            Self::Openmeteo => "openmeteo",
            Self::Ecowitt => "ecowitt",
            Self::Federated => "federated",
        }
    }

    /// Aviation weather reports (METAR) carry visibility, ceiling, and cloud
    /// observations that consumer stations never measure.
    pub const fn is_aviation_report(self) -> bool {
        matches!(self, Self::Metar | Self::MetarText)
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or(ValidationError::UnknownSourceType {
                value: value.to_owned(),
            })
    }
}
