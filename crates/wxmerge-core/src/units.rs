//! Unit conversion into the canonical aviation units.
//!
//! | Upstream | Canonical | Conversion |
//! |----------|-----------|------------|
//! | °F | °C | `(f - 32) / 1.8` |
//! | mph | kt | `× 0.868976` |
//! | m/s | kt | `× 1.943844` |
//! | km/h | kt | `÷ 1.852` |
//! | hPa, mb | inHg | `÷ 33.8639` |
//! | Pa | inHg | `÷ 100`, then as hPa |
//! | mm | in | `× 0.0393701` |
//! | m | SM | `÷ 1609.344` |
//! | km | SM | `× 1000`, then as metres |
//! | m | ft | `÷ 0.3048` |
//!
//! Adapters whose upstream declares units in the payload resolve the label
//! with [`temperature_c`], [`speed_kt`], [`pressure_inhg`], [`length_in`],
//! [`distance_sm`], and [`height_ft`].

use crate::domain::CloudCover;

pub const MPH_TO_KNOTS: f64 = 0.868976;
pub const MPS_TO_KNOTS: f64 = 1.943844;
pub const KMH_PER_KNOT: f64 = 1.852;
pub const HPA_PER_INHG: f64 = 33.8639;
pub const MM_TO_INCHES: f64 = 0.0393701;
pub const METERS_PER_STATUTE_MILE: f64 = 1609.344;
pub const METERS_PER_FOOT: f64 = 0.3048;

pub fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) / 1.8
}

pub fn mph_to_knots(value: f64) -> f64 {
    value * MPH_TO_KNOTS
}

pub fn mps_to_knots(value: f64) -> f64 {
    value * MPS_TO_KNOTS
}

pub fn kmh_to_knots(value: f64) -> f64 {
    value / KMH_PER_KNOT
}

pub fn hpa_to_inhg(value: f64) -> f64 {
    value / HPA_PER_INHG
}

pub fn pa_to_inhg(value: f64) -> f64 {
    hpa_to_inhg(value / 100.0)
}

pub fn mm_to_inches(value: f64) -> f64 {
    value * MM_TO_INCHES
}

pub fn meters_to_statute_miles(value: f64) -> f64 {
    value / METERS_PER_STATUTE_MILE
}

pub fn km_to_statute_miles(value: f64) -> f64 {
    meters_to_statute_miles(value * 1000.0)
}

pub fn meters_to_feet(value: f64) -> f64 {
    value / METERS_PER_FOOT
}

/// Relative humidity (%) from temperature and dewpoint in °C (Magnus formula).
pub fn relative_humidity(temperature_c: f64, dewpoint_c: f64) -> Option<f64> {
    const A: f64 = 17.625;
    const B: f64 = 243.04;

    if dewpoint_c > temperature_c + 0.5 {
        return None;
    }
    let gamma_dew = (A * dewpoint_c) / (B + dewpoint_c);
    let gamma_air = (A * temperature_c) / (B + temperature_c);
    let humidity = 100.0 * (gamma_dew - gamma_air).exp();
    humidity.is_finite().then(|| humidity.clamp(0.0, 100.0))
}

/// Maps total cloud cover percent onto an aviation coverage category.
pub fn cloud_cover_from_percent(percent: f64) -> Option<CloudCover> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return None;
    }
    Some(match percent {
        p if p <= 5.0 => CloudCover::Skc,
        p if p <= 25.0 => CloudCover::Few,
        p if p <= 50.0 => CloudCover::Sct,
        p if p <= 87.0 => CloudCover::Bkn,
        _ => CloudCover::Ovc,
    })
}

fn normalize_label(label: &str) -> String {
    let label = label.trim();
    let label = label
        .strip_prefix("wmoUnit:")
        .or_else(|| label.strip_prefix("unit:"))
        .unwrap_or(label);
    label
        .chars()
        .filter_map(|ch| match ch {
            '℃' => Some('c'),
            '℉' => Some('f'),
            '°' | 'º' | '_' | '.' => None,
            ch if ch.is_whitespace() => None,
            ch => Some(ch),
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Converts a temperature in a declared unit to °C.
pub fn temperature_c(value: f64, label: &str) -> Option<f64> {
    match normalize_label(label).as_str() {
        "c" | "degc" | "celsius" => Some(value),
        "f" | "degf" | "fahrenheit" => Some(fahrenheit_to_celsius(value)),
        "k" | "kelvin" => Some(value - 273.15),
        _ => None,
    }
}

/// Converts a speed in a declared unit to knots.
pub fn speed_kt(value: f64, label: &str) -> Option<f64> {
    match normalize_label(label).as_str() {
        "kt" | "kts" | "knot" | "knots" => Some(value),
        "mph" | "mi/h" => Some(mph_to_knots(value)),
        "m/s" | "ms-1" | "mps" => Some(mps_to_knots(value)),
        "km/h" | "kmh" | "kmh-1" | "kph" => Some(kmh_to_knots(value)),
        _ => None,
    }
}

/// Converts a pressure in a declared unit to inHg.
pub fn pressure_inhg(value: f64, label: &str) -> Option<f64> {
    match normalize_label(label).as_str() {
        "inhg" | "in" => Some(value),
        "hpa" | "mb" | "mbar" | "millibars" => Some(hpa_to_inhg(value)),
        "pa" | "pascals" => Some(pa_to_inhg(value)),
        "kpa" => Some(hpa_to_inhg(value * 10.0)),
        "mmhg" => Some(value / 25.4),
        _ => None,
    }
}

/// Converts a precipitation depth in a declared unit to inches.
pub fn length_in(value: f64, label: &str) -> Option<f64> {
    match normalize_label(label).as_str() {
        "in" | "inch" | "inches" => Some(value),
        "mm" | "millimeters" | "millimetres" => Some(mm_to_inches(value)),
        "cm" => Some(mm_to_inches(value * 10.0)),
        "m" => Some(mm_to_inches(value * 1000.0)),
        _ => None,
    }
}

/// Converts a horizontal distance in a declared unit to statute miles.
pub fn distance_sm(value: f64, label: &str) -> Option<f64> {
    match normalize_label(label).as_str() {
        "sm" | "mi" | "miles" | "statutemiles" => Some(value),
        "m" | "meters" | "metres" => Some(meters_to_statute_miles(value)),
        "km" | "kilometers" | "kilometres" => Some(km_to_statute_miles(value)),
        _ => None,
    }
}

/// Converts a vertical height in a declared unit to feet.
pub fn height_ft(value: f64, label: &str) -> Option<f64> {
    match normalize_label(label).as_str() {
        "ft" | "feet" => Some(value),
        "m" | "meters" | "metres" => Some(meters_to_feet(value)),
        "km" => Some(meters_to_feet(value * 1000.0)),
        _ => None,
    }
}
