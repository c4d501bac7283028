use serde::{Deserialize, Serialize};

use crate::domain::field::{CloudCover, Field, Unit};
use crate::SourceKind;

/// Scalar or categorical observation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Text(String),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(value) => Some(value),
        }
    }
}

/// A single canonical observation.
///
/// `value == None` together with `is_valid == false` is the canonical "no
/// data" representation. Adapters never surface missing data as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: Option<ReadingValue>,
    pub unit: Unit,
    /// Epoch seconds when the measurement was taken (not when it was fetched).
    pub observation_time: Option<i64>,
    pub source: SourceKind,
    pub is_valid: bool,
}

impl Reading {
    pub fn missing(field: Field, source: SourceKind) -> Self {
        Self {
            value: None,
            unit: field.canonical_unit(),
            observation_time: None,
            source,
            is_valid: false,
        }
    }

    /// Builds a numeric reading, already in the field's canonical unit.
    /// Non-finite or implausible values yield a missing reading.
    pub fn number(field: Field, value: f64, observed_at: Option<i64>, source: SourceKind) -> Self {
        if field.is_categorical() || !value.is_finite() || !field.plausible_range().contains(&value)
        {
            return Self::missing(field, source);
        }

        Self {
            value: Some(ReadingValue::Number(value)),
            unit: field.canonical_unit(),
            observation_time: observed_at,
            source,
            is_valid: true,
        }
    }

    pub fn cloud_cover(cover: CloudCover, observed_at: Option<i64>, source: SourceKind) -> Self {
        Self {
            value: Some(ReadingValue::Text(cover.as_str().to_owned())),
            unit: Unit::Category,
            observation_time: observed_at,
            source,
            is_valid: true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if !self.is_valid {
            return None;
        }
        self.value.as_ref().and_then(ReadingValue::as_f64)
    }

    pub fn as_text(&self) -> Option<&str> {
        if !self.is_valid {
            return None;
        }
        self.value.as_ref().and_then(ReadingValue::as_text)
    }
}

/// Speed, direction, and gust from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindGroup {
    pub speed: Reading,
    pub direction: Reading,
    pub gust: Reading,
}

impl WindGroup {
    pub fn missing(source: SourceKind) -> Self {
        Self {
            speed: Reading::missing(Field::WindSpeed, source),
            direction: Reading::missing(Field::WindDirection, source),
            gust: Reading::missing(Field::WindGust, source),
        }
    }

    /// Complete only when both speed and direction are valid. Gust may be
    /// absent. A variable (VRB) direction is invalid, so such a group is
    /// never complete.
    pub fn is_complete(&self) -> bool {
        self.speed.is_valid && self.direction.is_valid
    }

    /// Observation time of the group, taken from the older of speed and
    /// direction so a complete group never looks fresher than its parts.
    pub fn observation_time(&self) -> Option<i64> {
        match (self.speed.observation_time, self.direction.observation_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
