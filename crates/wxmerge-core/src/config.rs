//! Airport and engine configuration.
//!
//! Configuration is a single JSON document:
//!
//! ```json
//! {
//!   "engine": { "outage_threshold_secs": 10800 },
//!   "airports": [
//!     {
//!       "id": "KSPB",
//!       "name": "Scappoose Industrial Airpark",
//!       "sources": [
//!         { "type": "tempest", "station_id": "12345", "token": "env:TEMPEST_TOKEN" },
//!         { "type": "metar", "station_id": "KSPB", "nearby_stations": ["KHIO", "KPDX"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Credential values of the form `env:NAME` are read from the environment
//! variable `NAME` when the adapter asks for them.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::data_source::SourceError;
use crate::domain::Field;
use crate::obs_time::ObservationTimePolicy;
use crate::{ConfigError, ValidationError};

const ENV_PREFIX: &str = "env:";

/// One configured upstream for an airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nearby_stations: Vec<String>,
    /// Overrides the adapter's own preferred fields when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Provider-specific credentials and identifiers.
    #[serde(flatten)]
    pub settings: BTreeMap<String, Value>,
}

impl SourceDescriptor {
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            station_id: None,
            nearby_stations: Vec::new(),
            preferred: None,
            timeout_ms: None,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station_id = Some(station.into());
        self
    }

    pub fn with_nearby(mut self, stations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.nearby_stations = stations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_preferred(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.preferred = Some(fields.into_iter().collect());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn station(&self) -> Option<&str> {
        self.station_id
            .as_deref()
            .map(str::trim)
            .filter(|station| !station.is_empty())
    }

    /// Reads a setting as text, resolving `env:NAME` indirection. Empty
    /// values count as absent.
    pub fn setting(&self, key: &str) -> Option<String> {
        let raw = match self.settings.get(key)? {
            Value::String(text) => text.trim().to_owned(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return None,
        };
        let resolved = match raw.strip_prefix(ENV_PREFIX) {
            Some(name) => env::var(name.trim()).ok()?.trim().to_owned(),
            None => raw,
        };
        (!resolved.is_empty()).then_some(resolved)
    }

    /// First present setting among several accepted spellings.
    pub fn setting_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.setting(key))
    }

    pub fn setting_f64(&self, key: &str) -> Option<f64> {
        self.setting(key)?.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// # Errors
    ///
    /// Returns a configuration [`SourceError`] naming the missing key.
    pub fn require(&self, key: &str) -> Result<String, SourceError> {
        self.setting(key).ok_or_else(|| {
            SourceError::configuration(format!(
                "{} source requires setting '{key}'",
                self.source_type
            ))
        })
    }

    pub fn require_station(&self) -> Result<&str, SourceError> {
        self.station().ok_or_else(|| {
            SourceError::configuration(format!("{} source requires 'station_id'", self.source_type))
        })
    }

    /// Copy bound to an alternate station, used by the fallback chain.
    pub fn for_station(&self, station: &str) -> Self {
        Self {
            station_id: Some(station.to_owned()),
            nearby_stations: Vec::new(),
            ..self.clone()
        }
    }

    pub fn timeout_ms_or(&self, default_timeout_ms: u64) -> u64 {
        self.timeout_ms
            .filter(|timeout| *timeout > 0)
            .unwrap_or(default_timeout_ms)
    }
}

/// One airport and its ordered source list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub sources: Vec<SourceDescriptor>,
}

impl AirportConfig {
    pub fn new(id: impl Into<String>, sources: Vec<SourceDescriptor>) -> Self {
        Self {
            id: id.into(),
            name: None,
            sources,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyAirportId);
        }
        if self.sources.is_empty() {
            return Err(ValidationError::NoSources {
                airport: self.id.clone(),
            });
        }
        if let Some(index) = self
            .sources
            .iter()
            .position(|source| source.source_type.trim().is_empty())
        {
            return Err(ValidationError::EmptySourceType {
                airport: self.id.clone(),
                index,
            });
        }
        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Engine-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Age beyond which data is unusable for display. No default.
    pub outage_threshold_secs: u64,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub observation_time: ObservationTimePolicy,
}

impl EngineConfig {
    pub fn new(outage_threshold_secs: u64) -> Self {
        Self {
            outage_threshold_secs,
            default_timeout_ms: default_timeout_ms(),
            circuit_breaker: CircuitBreakerConfig::default(),
            observation_time: ObservationTimePolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outage_threshold_secs == 0 {
            return Err(ValidationError::ZeroOutageThreshold);
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ValidationError::ZeroFailureThreshold);
        }
        Ok(())
    }
}

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WxmergeConfig {
    pub engine: EngineConfig,
    #[serde(default)]
    pub airports: Vec<AirportConfig>,
}

impl WxmergeConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.engine.validate()?;
        self.airports.iter().try_for_each(AirportConfig::validate)
    }

    /// Looks up an airport by id, case-insensitively.
    pub fn airport(&self, id: &str) -> Result<&AirportConfig, ConfigError> {
        self.airports
            .iter()
            .find(|airport| airport.id.eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| ConfigError::UnknownAirport(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data_source::SourceErrorKind;

    const SAMPLE: &str = r#"{
        "engine": { "outage_threshold_secs": 10800, "circuit_breaker": { "failure_threshold": 5 } },
        "airports": [
            {
                "id": "KSPB",
                "sources": [
                    { "type": "tempest", "station_id": "4321", "token": "abc", "timeout_ms": 2500 },
                    { "type": "metar", "station_id": "KSPB", "nearby_stations": ["KHIO"], "preferred": ["visibility"] }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_sources_with_flattened_settings() {
        let config = WxmergeConfig::from_json_str(SAMPLE).expect("valid config");
        assert_eq!(config.engine.default_timeout_ms, 5_000);
        assert_eq!(config.engine.circuit_breaker.failure_threshold, 5);

        let airport = config.airport("kspb").expect("airport exists");
        let tempest = &airport.sources[0];
        assert_eq!(tempest.source_type, "tempest");
        assert_eq!(tempest.setting("token").as_deref(), Some("abc"));
        assert_eq!(tempest.timeout_ms_or(5_000), 2_500);

        let metar = &airport.sources[1];
        assert_eq!(metar.nearby_stations, vec![String::from("KHIO")]);
        assert_eq!(metar.preferred, Some(vec![Field::Visibility]));
    }

    #[test]
    fn outage_threshold_is_required() {
        let error = WxmergeConfig::from_json_str(r#"{"engine": {}, "airports": []}"#)
            .expect_err("missing outage threshold must fail");
        assert!(matches!(error, ConfigError::Json(_)));
    }

    #[test]
    fn rejects_airport_without_sources() {
        let error = WxmergeConfig::from_json_str(
            r#"{"engine": {"outage_threshold_secs": 60}, "airports": [{"id": "KSPB", "sources": []}]}"#,
        )
        .expect_err("must fail");
        assert!(matches!(
            error,
            ConfigError::Validation(ValidationError::NoSources { .. })
        ));
    }

    #[test]
    fn unknown_airport_is_a_config_error() {
        let config = WxmergeConfig::from_json_str(SAMPLE).expect("valid config");
        assert!(matches!(
            config.airport("KXYZ"),
            Err(ConfigError::UnknownAirport(_))
        ));
    }

    #[test]
    fn require_reports_configuration_error() {
        let source = SourceDescriptor::new("ambient").with_setting("api_key", "");
        let error = source.require("api_key").expect_err("empty key is absent");
        assert_eq!(error.kind(), SourceErrorKind::Configuration);
        assert!(error.message().contains("api_key"));
    }

    #[test]
    fn env_indirection_resolves_secrets() {
        std::env::set_var("WXMERGE_TEST_SECRET_4F2A", "from-env");
        let source = SourceDescriptor::new("federated")
            .with_setting("secret", "env:WXMERGE_TEST_SECRET_4F2A")
            .with_setting("missing", "env:WXMERGE_TEST_SECRET_UNSET_9C1B");
        assert_eq!(source.setting("secret").as_deref(), Some("from-env"));
        assert_eq!(source.setting("missing"), None);
    }

    #[test]
    fn for_station_rebinds_and_drops_alternates() {
        let source = SourceDescriptor::new("metar")
            .with_station("KSPB")
            .with_nearby(["KHIO", "KPDX"]);
        let alternate = source.for_station("KHIO");
        assert_eq!(alternate.station(), Some("KHIO"));
        assert!(alternate.nearby_stations.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write config");
        let config = WxmergeConfig::load_from_path(file.path()).expect("load config");
        assert_eq!(config.airports.len(), 1);

        let missing = WxmergeConfig::load_from_path("/nonexistent/wxmerge.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
