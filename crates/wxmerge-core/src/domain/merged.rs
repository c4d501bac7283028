use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::field::Field;
use crate::domain::reading::{Reading, WindGroup};
use crate::staleness::StalenessReport;
use crate::SourceKind;

/// Which source and station supplied a merged value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    /// Index of the source in the airport's configured source list.
    pub source_index: usize,
}

/// The winning reading for one field plus its provenance and staleness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedReading {
    pub reading: Reading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness: Option<StalenessReport>,
}

impl MergedReading {
    pub fn invalid(field: Field, source: SourceKind) -> Self {
        Self {
            reading: Reading::missing(field, source),
            provenance: None,
            staleness: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.reading.is_valid
    }
}

/// Outcome of one configured source during an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok,
    ConfigurationError,
    TransportError,
    Timeout,
    ParseError,
    Rejected,
    CircuitOpen,
    UnsupportedType,
}

/// Per-source diagnostics attached to the merged result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub outcome: SourceOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stations attempted, in order, for sources with a fallback chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempted_stations: Vec<String>,
    pub latency_ms: u64,
}

/// Merged weather for one airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedAirportWeather {
    pub airport: String,
    pub generated_at: i64,
    pub fields: BTreeMap<Field, MergedReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_report: Option<String>,
    pub overall: StalenessReport,
    pub sources: Vec<SourceReport>,
}

impl MergedAirportWeather {
    pub fn field(&self, field: Field) -> Option<&MergedReading> {
        self.fields.get(&field)
    }

    pub fn reading(&self, field: Field) -> Option<&Reading> {
        self.field(field).map(|merged| &merged.reading)
    }

    pub fn value(&self, field: Field) -> Option<f64> {
        self.reading(field).and_then(Reading::as_f64)
    }

    pub fn wind(&self) -> Option<WindGroup> {
        Some(WindGroup {
            speed: self.reading(Field::WindSpeed)?.clone(),
            direction: self.reading(Field::WindDirection)?.clone(),
            gust: self.reading(Field::WindGust)?.clone(),
        })
    }

    pub fn source_report(&self, source_type: &str) -> Option<&SourceReport> {
        self.sources
            .iter()
            .find(|report| report.source_type == source_type)
    }
}
