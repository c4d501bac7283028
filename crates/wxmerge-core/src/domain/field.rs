use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical weather fields populated by adapters and merged per airport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Dewpoint,
    Humidity,
    Pressure,
    Precipitation,
    Visibility,
    Ceiling,
    CloudCover,
    WindSpeed,
    WindDirection,
    WindGust,
}

impl Field {
    pub const ALL: [Self; 11] = [
        Self::Temperature,
        Self::Dewpoint,
        Self::Humidity,
        Self::Pressure,
        Self::Precipitation,
        Self::Visibility,
        Self::Ceiling,
        Self::CloudCover,
        Self::WindSpeed,
        Self::WindDirection,
        Self::WindGust,
    ];

    /// Fields merged one at a time. Wind speed and direction are merged as a
    /// group and are excluded here.
    pub const SCALAR: [Self; 8] = [
        Self::Temperature,
        Self::Dewpoint,
        Self::Humidity,
        Self::Pressure,
        Self::Precipitation,
        Self::Visibility,
        Self::Ceiling,
        Self::CloudCover,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Dewpoint => "dewpoint",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Precipitation => "precipitation",
            Self::Visibility => "visibility",
            Self::Ceiling => "ceiling",
            Self::CloudCover => "cloud_cover",
            Self::WindSpeed => "wind_speed",
            Self::WindDirection => "wind_direction",
            Self::WindGust => "wind_gust",
        }
    }

    pub const fn canonical_unit(self) -> Unit {
        match self {
            Self::Temperature | Self::Dewpoint => Unit::Celsius,
            Self::Humidity => Unit::Percent,
            Self::Pressure => Unit::InchesHg,
            Self::Precipitation => Unit::Inches,
            Self::Visibility => Unit::StatuteMiles,
            Self::Ceiling => Unit::FeetAgl,
            Self::CloudCover => Unit::Category,
            Self::WindSpeed | Self::WindGust => Unit::Knots,
            Self::WindDirection => Unit::DegreesTrue,
        }
    }

    pub const fn is_wind(self) -> bool {
        matches!(self, Self::WindSpeed | Self::WindDirection | Self::WindGust)
    }

    pub const fn is_categorical(self) -> bool {
        matches!(self, Self::CloudCover)
    }

    /// Physically plausible bounds in the canonical unit. Values outside are
    /// treated as garbage, not clamped.
    pub fn plausible_range(self) -> RangeInclusive<f64> {
        match self {
            Self::Temperature => -90.0..=65.0,
            Self::Dewpoint => -90.0..=40.0,
            Self::Humidity => 0.0..=100.0,
            Self::Pressure => 25.0..=33.0,
            Self::Precipitation => 0.0..=40.0,
            Self::Visibility => 0.0..=100.0,
            Self::Ceiling => 0.0..=60_000.0,
            Self::WindSpeed => 0.0..=250.0,
            Self::WindDirection => 0.0..=360.0,
            Self::WindGust => 0.0..=300.0,
            Self::CloudCover => 0.0..=0.0,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
            .ok_or(ValidationError::UnknownField {
                value: value.to_owned(),
            })
    }
}

/// Canonical units. Every reading carries the canonical unit of its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "degC")]
    Celsius,
    #[serde(rename = "percent")]
    Percent,
    #[serde(rename = "inHg")]
    InchesHg,
    #[serde(rename = "in")]
    Inches,
    #[serde(rename = "SM")]
    StatuteMiles,
    #[serde(rename = "ft_agl")]
    FeetAgl,
    #[serde(rename = "kt")]
    Knots,
    #[serde(rename = "deg_true")]
    DegreesTrue,
    #[serde(rename = "category")]
    Category,
}

impl Unit {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Percent => "%",
            Self::InchesHg => "inHg",
            Self::Inches => "in",
            Self::StatuteMiles => "SM",
            Self::FeetAgl => "ft AGL",
            Self::Knots => "kt",
            Self::DegreesTrue => "°",
            Self::Category => "",
        }
    }
}

/// Sky cover categories, ordered by increasing coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CloudCover {
    #[serde(rename = "SKC")]
    Skc,
    #[serde(rename = "CLR")]
    Clr,
    #[serde(rename = "FEW")]
    Few,
    #[serde(rename = "SCT")]
    Sct,
    #[serde(rename = "BKN")]
    Bkn,
    #[serde(rename = "OVC")]
    Ovc,
    #[serde(rename = "VV")]
    Vv,
}

impl CloudCover {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skc => "SKC",
            Self::Clr => "CLR",
            Self::Few => "FEW",
            Self::Sct => "SCT",
            Self::Bkn => "BKN",
            Self::Ovc => "OVC",
            Self::Vv => "VV",
        }
    }

    /// Broken, overcast, and vertical visibility layers define a ceiling.
    pub const fn forms_ceiling(self) -> bool {
        matches!(self, Self::Bkn | Self::Ovc | Self::Vv)
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "SKC" | "NSC" | "NCD" => Some(Self::Skc),
            "CLR" | "CAVOK" => Some(Self::Clr),
            "FEW" => Some(Self::Few),
            "SCT" => Some(Self::Sct),
            "BKN" => Some(Self::Bkn),
            "OVC" | "OVX" => Some(Self::Ovc),
            "VV" => Some(Self::Vv),
            _ => None,
        }
    }
}

impl Display for CloudCover {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
