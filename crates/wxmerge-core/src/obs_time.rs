//! Observation-time resolution.
//!
//! Adapters report when a measurement was *taken*, not when it was fetched.
//! Candidates are tried in priority order and each must fall inside the
//! policy's sanity window:
//!
//! | Priority | Candidate | Example |
//! |----------|-----------|---------|
//! | 1 | explicit epoch (seconds or milliseconds) | `1705323180`, `1705323180000` |
//! | 2 | textual timestamp | `2024-01-15T12:53:00+00:00`, `2024/01/15 12:53` |
//! | 3 | METAR day/time token | `151253Z` |
//! | 4 | fetch time | – |

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime};

const SECONDS_PER_DAY: i64 = 86_400;

/// Epoch values above this are milliseconds (year 5138 in seconds).
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

const NAIVE_FORMATS: [&[BorrowedFormatItem<'static>]; 4] = [
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
    format_description!("[year]/[month]/[day] [hour]:[minute]"),
];

/// Sanity window and METAR month disambiguation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationTimePolicy {
    pub max_age_hours: u32,
    pub future_tolerance_secs: i64,
    pub future_days: i64,
    pub past_days: i64,
}

impl Default for ObservationTimePolicy {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            future_tolerance_secs: 300,
            future_days: 2,
            past_days: 21,
        }
    }
}

/// Observation-time candidates extracted from one payload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeCandidates<'a> {
    pub epoch: Option<f64>,
    pub text: Option<&'a str>,
    pub day_time: Option<&'a str>,
}

impl<'a> TimeCandidates<'a> {
    pub fn epoch(value: Option<f64>) -> Self {
        Self {
            epoch: value,
            ..Self::default()
        }
    }

    pub fn text(value: Option<&'a str>) -> Self {
        Self {
            text: value,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, value: Option<&'a str>) -> Self {
        self.text = value;
        self
    }

    pub fn with_day_time(mut self, value: Option<&'a str>) -> Self {
        self.day_time = value;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.epoch.is_none() && self.text.is_none() && self.day_time.is_none()
    }
}

impl ObservationTimePolicy {
    /// True when `observed_at` is neither too old nor too far in the future.
    pub fn is_plausible(&self, observed_at: i64, now: i64) -> bool {
        let max_age = i64::from(self.max_age_hours) * 3_600;
        observed_at >= now - max_age && observed_at <= now + self.future_tolerance_secs
    }

    /// Resolves the first plausible candidate, falling back to `fetch_time`.
    pub fn resolve(&self, candidates: TimeCandidates<'_>, fetch_time: i64) -> i64 {
        self.resolve_strict(candidates, fetch_time)
            .unwrap_or(fetch_time)
    }

    /// Like [`resolve`](Self::resolve) but yields `None` when no candidate is
    /// plausible.
    pub fn resolve_strict(&self, candidates: TimeCandidates<'_>, fetch_time: i64) -> Option<i64> {
        let plausible = |value: &i64| self.is_plausible(*value, fetch_time);

        candidates
            .epoch
            .and_then(normalize_epoch)
            .filter(plausible)
            .or_else(|| candidates.text.and_then(parse_timestamp).filter(plausible))
            .or_else(|| {
                candidates
                    .day_time
                    .and_then(|token| self.resolve_day_time(token, fetch_time))
                    .filter(plausible)
            })
    }

    /// Resolves a METAR `DDHHMMZ` token against the fetch date.
    ///
    /// The token carries no month or year. A day that lands more than
    /// `future_days` ahead belongs to the previous month; one more than
    /// `past_days` behind belongs to the next month.
    pub fn resolve_day_time(&self, token: &str, fetch_time: i64) -> Option<i64> {
        let (day, hour, minute) = parse_day_time_token(token)?;
        let fetch = OffsetDateTime::from_unix_timestamp(fetch_time).ok()?;
        let (year, month) = (fetch.year(), fetch.month());

        let candidate = at(year, month, day, hour, minute)
            .or_else(|| {
                let (year, month) = previous_month(year, month);
                at(year, month, day, hour, minute)
            })
            .or_else(|| {
                let (year, month) = next_month(year, month);
                at(year, month, day, hour, minute)
            })?;

        if candidate - fetch_time > self.future_days * SECONDS_PER_DAY {
            let (year, month) = previous_month(year, month);
            return at(year, month, day, hour, minute);
        }
        if fetch_time - candidate > self.past_days * SECONDS_PER_DAY {
            let (year, month) = next_month(year, month);
            return at(year, month, day, hour, minute);
        }
        Some(candidate)
    }
}

/// Normalises an epoch in seconds or milliseconds to whole seconds.
pub fn normalize_epoch(value: f64) -> Option<i64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let seconds = if value >= MILLIS_THRESHOLD {
        value / 1_000.0
    } else {
        value
    };
    Some(seconds.floor() as i64)
}

/// Parses RFC 3339, offset-less ISO-8601 (treated as UTC), and the slash
/// and space separated forms used by station text feeds.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(parsed.unix_timestamp());
    }
    if let Ok(epoch) = text.parse::<f64>() {
        return normalize_epoch(epoch);
    }

    let naive = strip_fraction(text.trim_end_matches('Z').trim_end_matches(" UTC")).replace('T', " ");
    NAIVE_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(&naive, *format).ok())
        .map(|parsed| parsed.assume_utc().unix_timestamp())
}

fn strip_fraction(text: &str) -> String {
    match text.rfind('.') {
        Some(dot) if text[dot + 1..].chars().all(|ch| ch.is_ascii_digit()) => text[..dot].to_owned(),
        _ => text.to_owned(),
    }
}

fn parse_day_time_token(token: &str) -> Option<(u8, u8, u8)> {
    let digits = token.trim().strip_suffix('Z')?;
    if digits.len() != 6 || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let day = digits[0..2].parse::<u8>().ok()?;
    let hour = digits[2..4].parse::<u8>().ok()?;
    let minute = digits[4..6].parse::<u8>().ok()?;
    (day >= 1 && hour < 24 && minute < 60).then_some((day, hour, minute))
}

fn at(year: i32, month: Month, day: u8, hour: u8, minute: u8) -> Option<i64> {
    let date = Date::from_calendar_date(year, month, day).ok()?;
    let datetime = date.with_hms(hour, minute, 0).ok()?;
    Some(datetime.assume_utc().unix_timestamp())
}

fn previous_month(year: i32, month: Month) -> (i32, Month) {
    match month {
        Month::January => (year - 1, Month::December),
        other => (year, other.previous()),
    }
}

fn next_month(year: i32, month: Month) -> (i32, Month) {
    match month {
        Month::December => (year + 1, Month::January),
        other => (year, other.next()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn epoch(value: OffsetDateTime) -> i64 {
        value.unix_timestamp()
    }

    #[test]
    fn parses_textual_timestamps_as_utc() {
        let expected = epoch(datetime!(2024-01-15 12:53:00 UTC));
        assert_eq!(parse_timestamp("2024-01-15T12:53:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T12:53:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T12:53:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T12:53:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2024/01/15 12:53"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15 12:53:00"), Some(expected));
        assert_eq!(parse_timestamp("not a time"), None);
    }

    #[test]
    fn millisecond_epochs_are_normalised() {
        assert_eq!(normalize_epoch(1_705_323_180_000.0), Some(1_705_323_180));
        assert_eq!(normalize_epoch(1_705_323_180.0), Some(1_705_323_180));
        assert_eq!(normalize_epoch(-1.0), None);
    }

    #[test]
    fn day_time_token_uses_fetch_month() {
        let policy = ObservationTimePolicy::default();
        let fetch = epoch(datetime!(2024-01-15 13:10:00 UTC));
        assert_eq!(
            policy.resolve_day_time("151253Z", fetch),
            Some(epoch(datetime!(2024-01-15 12:53:00 UTC)))
        );
    }

    #[test]
    fn day_time_token_rolls_back_across_month_and_year() {
        let policy = ObservationTimePolicy::default();
        let fetch = epoch(datetime!(2024-01-01 00:20:00 UTC));
        assert_eq!(
            policy.resolve_day_time("312350Z", fetch),
            Some(epoch(datetime!(2023-12-31 23:50:00 UTC)))
        );
    }

    #[test]
    fn day_time_token_rolls_forward_when_far_in_past() {
        let policy = ObservationTimePolicy::default();
        let fetch = epoch(datetime!(2024-03-31 23:58:00 UTC));
        assert_eq!(
            policy.resolve_day_time("010005Z", fetch),
            Some(epoch(datetime!(2024-04-01 00:05:00 UTC)))
        );
    }

    #[test]
    fn implausible_candidates_fall_through_to_next_priority() {
        let policy = ObservationTimePolicy::default();
        let fetch = epoch(datetime!(2024-01-15 13:00:00 UTC));
        let candidates = TimeCandidates::epoch(Some(42.0))
            .with_text(Some("2024-01-15T12:40:00Z"))
            .with_day_time(Some("151230Z"));
        assert_eq!(
            policy.resolve(candidates, fetch),
            epoch(datetime!(2024-01-15 12:40:00 UTC))
        );

        let future = TimeCandidates::text(Some("2024-01-15T14:00:00Z"));
        assert_eq!(policy.resolve(future, fetch), fetch);
        assert_eq!(policy.resolve_strict(future, fetch), None);
    }
}
