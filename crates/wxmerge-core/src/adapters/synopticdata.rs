use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::SourceDescriptor;
use crate::data_source::{parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::{json_number, json_text};
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://api.synopticdata.com/v2/stations/latest";

const FIELDS: &[Field] = &[
    Field::Temperature,
    Field::Dewpoint,
    Field::Humidity,
    Field::Pressure,
    Field::Precipitation,
    Field::Visibility,
    Field::WindSpeed,
    Field::WindDirection,
    Field::WindGust,
];

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Synopticdata,
    fields: FIELDS,
    update_frequency_secs: 300,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "token",
    wire_format: "json",
};

/// Variable names per field, most preferred first, with their unit converter.
const VARIABLES: &[(Field, &[&str], fn(f64, &str) -> Option<f64>)] = &[
    (Field::Temperature, &["air_temp"], units::temperature_c),
    (Field::Dewpoint, &["dew_point_temperature"], units::temperature_c),
    (Field::Humidity, &["relative_humidity"], percent),
    (
        Field::Pressure,
        &["altimeter", "sea_level_pressure", "pressure"],
        units::pressure_inhg,
    ),
    (
        Field::Precipitation,
        &["precip_accum_24_hour", "precip_accum_since_local_midnight", "precip_accum_one_hour"],
        units::length_in,
    ),
    (Field::Visibility, &["visibility"], units::distance_sm),
    (Field::WindSpeed, &["wind_speed"], units::speed_kt),
    (Field::WindDirection, &["wind_direction"], degrees),
    (Field::WindGust, &["wind_gust"], units::speed_kt),
];

fn percent(value: f64, _label: &str) -> Option<f64> {
    Some(value)
}

fn degrees(value: f64, _label: &str) -> Option<f64> {
    Some(value)
}

/// Synoptic Data latest observations.
///
/// Units are declared once per variable in the `UNITS` block and every
/// observation carries its own `date_time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynopticDataAdapter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct SynopticPayload {
    #[serde(default)]
    summary: Option<SynopticSummary>,
    #[serde(default)]
    units: BTreeMap<String, String>,
    #[serde(default)]
    station: Vec<SynopticStation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SynopticSummary {
    #[serde(default, deserialize_with = "crate::parsing::lenient_f64")]
    response_code: Option<f64>,
    #[serde(default)]
    response_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct SynopticStation {
    #[serde(default)]
    stid: Option<String>,
    #[serde(default)]
    observations: Map<String, Value>,
}

/// First `{variable}_value_*` entry in key order.
fn observation<'a>(observations: &'a Map<String, Value>, variable: &str) -> Option<&'a Value> {
    let prefix = format!("{variable}_value_");
    observations
        .iter()
        .filter(|(key, _)| key.starts_with(&prefix))
        .min_by(|(left, _), (right, _)| left.cmp(right))
        .map(|(_, value)| value)
}

impl WeatherSource for SynopticDataAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Synopticdata
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?;
        let token = source.require("token")?;
        Ok(HttpRequest::get_with_query(
            BASE_URL,
            [("stid", station), ("token", token.as_str()), ("within", "120")],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let payload: SynopticPayload = parse_json(self.kind(), body)?;
        if let Some(summary) = &payload.summary {
            if summary.response_code.is_some_and(|code| code != 1.0) {
                return Err(SourceError::parse(format!(
                    "synopticdata request failed: {}",
                    summary.response_message.as_deref().unwrap_or("unknown error")
                )));
            }
        }
        let station = payload
            .station
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::parse("synopticdata response has no station"))?;
        crate::data_source::check_station(self.kind(), source.station(), station.stid.as_deref())?;

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        let mut latest = None;
        for (field, variables, convert) in VARIABLES {
            let Some((variable, entry)) = variables.iter().find_map(|variable| {
                observation(&station.observations, variable).map(|entry| (*variable, entry))
            }) else {
                continue;
            };
            let label = payload.units.get(variable).map(String::as_str).unwrap_or("");
            let value = json_number(entry, "value").and_then(|value| convert(value, label));
            let observed_at =
                ctx.observed_at_strict(TimeCandidates::text(json_text(entry, "date_time")));
            if observed_at.is_none() {
                continue;
            }
            latest = latest.max(observed_at);
            builder.number_at(*field, value, observed_at);
        }

        match latest {
            Some(observed_at) => {
                builder.observed_at(observed_at).derive_humidity();
                Ok(builder.build())
            }
            None => Err(SourceError::rejected(
                "synopticdata station has no observation inside the accepted window",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{assert_close, ctx};
    use crate::data_source::SourceErrorKind;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new("synopticdata")
            .with_station("KSPB")
            .with_setting("token", "tok")
    }

    const BODY: &str = r#"{
        "SUMMARY": {"RESPONSE_CODE": 1, "RESPONSE_MESSAGE": "OK"},
        "UNITS": {"air_temp": "Celsius", "wind_speed": "m/s", "wind_gust": "m/s",
                  "altimeter": "Pascals", "visibility": "Statute miles",
                  "precip_accum_24_hour": "Millimeters", "relative_humidity": "%"},
        "STATION": [{"STID": "KSPB", "OBSERVATIONS": {
            "air_temp_value_1": {"value": 3.5, "date_time": "2024-01-15T12:55:00Z"},
            "wind_speed_value_1": {"value": 5.0, "date_time": "2024-01-15T12:55:00Z"},
            "wind_direction_value_1": {"value": 300, "date_time": "2024-01-15T12:55:00Z"},
            "altimeter_value_1d": {"value": 101325, "date_time": "2024-01-15T12:55:00Z"},
            "visibility_value_1": {"value": 10.0, "date_time": "2024-01-15T12:55:00Z"},
            "precip_accum_24_hour_value_1": {"value": 25.4, "date_time": "2024-01-15T12:00:00Z"},
            "relative_humidity_value_1": {"value": 88, "date_time": "2024-01-13T12:00:00Z"}
        }}]
    }"#;

    #[test]
    fn request_carries_station_and_token() {
        let request = SynopticDataAdapter
            .build_request(&descriptor(), 0)
            .expect("request builds");
        assert!(request.url.contains("stid=KSPB"));
        assert!(request.url.contains("token=tok"));
    }

    #[test]
    fn converts_using_declared_units_and_per_field_times() {
        let snapshot = SynopticDataAdapter.parse(BODY, &descriptor(), &ctx());

        assert_close(snapshot.temperature.as_f64(), 3.5);
        assert_close(snapshot.wind.speed.as_f64(), 9.72);
        assert_close(snapshot.pressure.as_f64(), 29.92);
        assert_close(snapshot.visibility.as_f64(), 10.0);
        assert_close(snapshot.precipitation.as_f64(), 1.0);
        assert_eq!(snapshot.precipitation.observation_time, Some(1_705_320_000));
        assert_eq!(snapshot.temperature.observation_time, Some(1_705_323_300));
        assert!(!snapshot.humidity.is_valid, "two-day-old humidity is dropped");
    }

    #[test]
    fn null_and_sentinel_values_are_missing() {
        let body = r#"{
            "SUMMARY": {"RESPONSE_CODE": 1, "RESPONSE_MESSAGE": "OK"},
            "UNITS": {"air_temp": "Celsius", "wind_speed": "m/s", "visibility": "Statute miles"},
            "STATION": [{"STID": "KSPB", "OBSERVATIONS": {
                "air_temp_value_1": {"value": 3.5, "date_time": "2024-01-15T12:55:00Z"},
                "wind_speed_value_1": {"value": null, "date_time": "2024-01-15T12:55:00Z"},
                "visibility_value_1": {"value": -9999, "date_time": "2024-01-15T12:55:00Z"}
            }}]
        }"#;

        let snapshot = SynopticDataAdapter.parse(body, &descriptor(), &ctx());

        assert_close(snapshot.temperature.as_f64(), 3.5);
        assert!(!snapshot.wind.speed.is_valid);
        assert_eq!(snapshot.wind.speed.value, None);
        assert!(!snapshot.visibility.is_valid);
        assert_eq!(snapshot.visibility.value, None);
    }

    #[test]
    fn other_station_is_rejected() {
        let source = descriptor().with_station("KPDX");
        let error = SynopticDataAdapter
            .try_parse(BODY, &source, &ctx())
            .expect_err("wrong station");
        assert_eq!(error.kind(), SourceErrorKind::Rejected);
    }

    #[test]
    fn failed_summary_is_a_parse_error() {
        let body = r#"{"SUMMARY":{"RESPONSE_CODE":2,"RESPONSE_MESSAGE":"Invalid token"}}"#;
        let error = SynopticDataAdapter
            .try_parse(body, &descriptor(), &ctx())
            .expect_err("api error");
        assert_eq!(error.kind(), SourceErrorKind::Parse);
        assert!(error.message().contains("Invalid token"));
    }
}
