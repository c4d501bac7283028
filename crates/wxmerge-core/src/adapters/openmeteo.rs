use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::config::SourceDescriptor;
use crate::data_source::{parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::{json_number, json_text};
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_VARIABLES: &str = "temperature_2m,relative_humidity_2m,dew_point_2m,pressure_msl,\
precipitation,cloud_cover,visibility,wind_speed_10m,wind_direction_10m,wind_gusts_10m";

const FIELDS: &[Field] = &[
    Field::Temperature,
    Field::Dewpoint,
    Field::Humidity,
    Field::Pressure,
    Field::Precipitation,
    Field::Visibility,
    Field::CloudCover,
    Field::WindSpeed,
    Field::WindDirection,
    Field::WindGust,
];

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Openmeteo,
    fields: FIELDS,
    update_frequency_secs: 900,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "none",
    wire_format: "json",
};

/// Open-Meteo modelled current conditions for a coordinate.
///
/// Units come from the `current_units` block; cloud cover arrives as a
/// percentage and is mapped onto a sky cover category.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenMeteoAdapter;

#[derive(Debug, Deserialize)]
struct OpenMeteoPayload {
    #[serde(default)]
    current_units: BTreeMap<String, String>,
    #[serde(default)]
    current: Option<Value>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
}

fn coordinates(source: &SourceDescriptor) -> Result<(f64, f64), SourceError> {
    let latitude = source.setting_f64("latitude");
    let longitude = source.setting_f64("longitude");
    match (latitude, longitude) {
        (Some(latitude), Some(longitude))
            if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) =>
        {
            Ok((latitude, longitude))
        }
        _ => Err(SourceError::configuration(
            "openmeteo source requires valid 'latitude' and 'longitude' settings",
        )),
    }
}

impl WeatherSource for OpenMeteoAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Openmeteo
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn endpoint_identity(&self, source: &SourceDescriptor) -> String {
        match coordinates(source) {
            Ok((latitude, longitude)) => format!("{latitude:.4},{longitude:.4}"),
            Err(_) => String::from("default"),
        }
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let (latitude, longitude) = coordinates(source)?;
        let latitude = latitude.to_string();
        let longitude = longitude.to_string();
        Ok(HttpRequest::get_with_query(
            BASE_URL,
            [
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_VARIABLES),
                ("timeformat", "unixtime"),
            ],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        _source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let payload: OpenMeteoPayload = parse_json(self.kind(), body)?;
        if payload.error {
            return Err(SourceError::parse(format!(
                "openmeteo request failed: {}",
                payload.reason.as_deref().unwrap_or("unknown reason")
            )));
        }
        let current = payload
            .current
            .filter(Value::is_object)
            .ok_or_else(|| SourceError::parse("openmeteo response has no current block"))?;

        let candidates = TimeCandidates::epoch(json_number(&current, "time"))
            .with_text(json_text(&current, "time"));
        let observed_at = ctx.observation_time(self.kind(), candidates)?;
        let units_of = |key: &str| payload.current_units.get(key).map(String::as_str).unwrap_or("");
        let value = |key: &str, convert: fn(f64, &str) -> Option<f64>| {
            json_number(&current, key).and_then(|value| convert(value, units_of(key)))
        };

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(Field::Temperature, value("temperature_2m", units::temperature_c))
            .number(Field::Dewpoint, value("dew_point_2m", units::temperature_c))
            .number(Field::Humidity, json_number(&current, "relative_humidity_2m"))
            .number(Field::Pressure, value("pressure_msl", units::pressure_inhg))
            .number(Field::Precipitation, value("precipitation", units::length_in))
            .number(Field::Visibility, value("visibility", units::distance_sm))
            .cloud_cover(json_number(&current, "cloud_cover").and_then(units::cloud_cover_from_percent))
            .number(Field::WindSpeed, value("wind_speed_10m", units::speed_kt))
            .number(Field::WindDirection, json_number(&current, "wind_direction_10m"))
            .number(Field::WindGust, value("wind_gusts_10m", units::speed_kt))
            .derive_humidity();
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{assert_close, ctx};
    use crate::data_source::SourceErrorKind;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new("openmeteo")
            .with_setting("latitude", 45.77)
            .with_setting("longitude", -122.86)
    }

    #[test]
    fn coordinates_are_required() {
        let request = OpenMeteoAdapter
            .build_request(&descriptor(), 0)
            .expect("request builds");
        assert!(request.url.contains("latitude=45.77"));
        assert!(request.url.contains("timeformat=unixtime"));
        assert_eq!(OpenMeteoAdapter.endpoint_identity(&descriptor()), "45.7700,-122.8600");

        let error = OpenMeteoAdapter
            .build_request(&SourceDescriptor::new("openmeteo").with_setting("latitude", 95.0), 0)
            .expect_err("coordinates required");
        assert_eq!(error.kind(), SourceErrorKind::Configuration);
    }

    #[test]
    fn converts_current_units_and_cloud_percent() {
        let body = r#"{"latitude":45.77,"longitude":-122.86,
            "current_units":{"time":"unixtime","temperature_2m":"°F","dew_point_2m":"°F",
              "pressure_msl":"hPa","precipitation":"mm","visibility":"m","wind_speed_10m":"km/h",
              "wind_gusts_10m":"km/h","cloud_cover":"%","relative_humidity_2m":"%"},
            "current":{"time":1705322700,"interval":900,"temperature_2m":68.0,"dew_point_2m":50.0,
              "relative_humidity_2m":52,"pressure_msl":1013.25,"precipitation":0.0,
              "visibility":24140.0,"cloud_cover":70,"wind_speed_10m":18.52,
              "wind_direction_10m":200,"wind_gusts_10m":37.04}}"#;

        let snapshot = OpenMeteoAdapter.parse(body, &descriptor(), &ctx());

        assert_close(snapshot.temperature.as_f64(), 20.0);
        assert_close(snapshot.wind.speed.as_f64(), 10.0);
        assert_close(snapshot.wind.gust.as_f64(), 20.0);
        assert_close(snapshot.visibility.as_f64(), 15.0);
        assert_eq!(snapshot.cloud_cover.as_text(), Some("BKN"));
        assert!(!snapshot.ceiling.is_valid);
        assert_eq!(snapshot.pressure.observation_time, Some(1_705_322_700));
    }

    #[test]
    fn null_values_are_missing() {
        let body = r#"{"current_units":{"temperature_2m":"°C","visibility":"m","wind_speed_10m":"km/h"},
            "current":{"time":1705322700,"temperature_2m":null,"visibility":null,
              "wind_speed_10m":18.52,"wind_direction_10m":null,"cloud_cover":null}}"#;

        let snapshot = OpenMeteoAdapter.parse(body, &descriptor(), &ctx());

        assert!(!snapshot.temperature.is_valid);
        assert_eq!(snapshot.temperature.value, None);
        assert!(!snapshot.visibility.is_valid);
        assert!(!snapshot.cloud_cover.is_valid);
        assert_close(snapshot.wind.speed.as_f64(), 10.0);
        assert!(!snapshot.wind.is_complete());
    }

    #[test]
    fn error_payload_is_a_parse_error() {
        let body = r#"{"error":true,"reason":"Latitude must be in range of -90 to 90°."}"#;
        let error = OpenMeteoAdapter
            .try_parse(body, &descriptor(), &ctx())
            .expect_err("api error");
        assert_eq!(error.kind(), SourceErrorKind::Parse);
    }
}
