//! Tolerant value extraction shared by the adapters.
//!
//! Upstream payloads mark missing data with format-specific tokens. Every
//! helper here maps those tokens to `None` so that a missing value can never
//! surface as zero or as the literal token.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Tokens that mean "no measurement" in at least one upstream format.
const SENTINELS: &[&str] = &[
    "", "M", "MM", "MSNG", "N/A", "NA", "NAN", "NULL", "NONE", "VRB", "\\", "-", "--", "-9999",
    "-9999.0", "-999", "-999.0",
];

/// Returns true for tokens that encode a missing or variable value.
pub fn is_sentinel(token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return true;
    }
    if token.chars().all(|ch| matches!(ch, '/' | '#' | '*')) {
        return true;
    }
    let upper = token.to_ascii_uppercase();
    SENTINELS.iter().any(|sentinel| *sentinel == upper)
}

/// Parses a finite number from text, rejecting sentinels.
pub fn number_from_str(token: &str) -> Option<f64> {
    if is_sentinel(token) {
        return None;
    }
    let value = token.trim().trim_start_matches('+').parse::<f64>().ok()?;
    finite(value)
}

/// Extracts a finite number from a JSON number or numeric string.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => {
            let value = number.as_f64()?;
            if value <= -9999.0 {
                return None;
            }
            finite(value)
        }
        Value::String(text) => number_from_str(text),
        _ => None,
    }
}

/// Serde adapter for numeric payload fields that may hold sentinels,
/// numeric strings, or nulls. Use with `#[serde(default, deserialize_with = ...)]`.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_json(&value))
}

/// Serde adapter for text fields that may hold sentinels or non-strings.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) if !is_sentinel(&text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Reads `object[key]` as a number.
pub fn json_number(object: &Value, key: &str) -> Option<f64> {
    object.get(key).and_then(number_from_json)
}

/// Reads `object[key]` as a trimmed, non-sentinel string.
pub fn json_text<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !is_sentinel(text))
}

/// Parses whole numbers, simple fractions, and mixed numbers such as
/// `"1 1/2"`, `"3/4"`, and `"10"`.
pub fn parse_fraction(token: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut parts = 0;
    for part in token.split_whitespace() {
        parts += 1;
        if parts > 2 {
            return None;
        }
        total += match part.split_once('/') {
            Some((numerator, denominator)) => {
                let numerator = numerator.parse::<f64>().ok()?;
                let denominator = denominator.parse::<f64>().ok()?;
                if denominator == 0.0 {
                    return None;
                }
                numerator / denominator
            }
            None => part.parse::<f64>().ok()?,
        };
    }
    (parts > 0).then_some(total).and_then(finite)
}

/// Parses a statute-mile visibility token such as `10+`, `P6`, `M1/4`,
/// `1 1/2`, or `6+SM`. Greater-than and less-than markers resolve to the
/// stated bound.
pub fn parse_visibility_sm(token: &str) -> Option<f64> {
    let token = token.trim();
    let token = token.strip_suffix("SM").unwrap_or(token).trim();
    if is_sentinel(token) {
        return None;
    }
    let token = token
        .strip_prefix('P')
        .or_else(|| token.strip_prefix('M'))
        .unwrap_or(token);
    let token = token.strip_suffix('+').unwrap_or(token);
    parse_fraction(token)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
