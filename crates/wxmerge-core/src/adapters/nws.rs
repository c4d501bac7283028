use serde::Deserialize;

use crate::adapters::ALL_FIELDS;
use crate::config::SourceDescriptor;
use crate::data_source::{
    check_station, parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource,
};
use crate::domain::{CloudCover, Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::{lenient_f64, lenient_text};
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://api.weather.gov/stations";
const DEFAULT_USER_AGENT: &str = concat!("wxmerge/", env!("CARGO_PKG_VERSION"));

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Nws,
    fields: ALL_FIELDS,
    update_frequency_secs: 900,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "user-agent",
    wire_format: "geojson",
};

/// api.weather.gov latest station observation. Every value carries its own
/// WMO `unitCode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NwsAdapter;

#[derive(Debug, Deserialize)]
struct NwsFeature {
    properties: NwsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsProperties {
    #[serde(default, deserialize_with = "lenient_text")]
    station_id: Option<String>,
    /// Station URL; the last path segment is the identifier.
    #[serde(default, deserialize_with = "lenient_text")]
    station: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    raw_message: Option<String>,
    #[serde(default)]
    temperature: NwsValue,
    #[serde(default)]
    dewpoint: NwsValue,
    #[serde(default)]
    relative_humidity: NwsValue,
    #[serde(default)]
    sea_level_pressure: NwsValue,
    #[serde(default)]
    barometric_pressure: NwsValue,
    #[serde(default)]
    precipitation_last_hour: NwsValue,
    #[serde(default)]
    visibility: NwsValue,
    #[serde(default)]
    wind_speed: NwsValue,
    #[serde(default)]
    wind_direction: NwsValue,
    #[serde(default)]
    wind_gust: NwsValue,
    #[serde(default)]
    cloud_layers: Vec<NwsCloudLayer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsValue {
    #[serde(default, deserialize_with = "lenient_f64")]
    value: Option<f64>,
    #[serde(default)]
    unit_code: String,
    /// `X` marks a value that failed quality control.
    #[serde(default)]
    quality_control: Option<String>,
}

impl NwsValue {
    fn converted(&self, convert: fn(f64, &str) -> Option<f64>) -> Option<f64> {
        if self.quality_control.as_deref() == Some("X") {
            return None;
        }
        convert(self.value?, &self.unit_code)
    }

    fn plain(&self) -> Option<f64> {
        self.converted(|value, _| Some(value))
    }
}

#[derive(Debug, Deserialize)]
struct NwsCloudLayer {
    #[serde(default)]
    base: NwsValue,
    #[serde(default, deserialize_with = "lenient_text")]
    amount: Option<String>,
}

impl NwsProperties {
    fn reported_station(&self) -> Option<&str> {
        self.station_id.as_deref().or_else(|| {
            self.station
                .as_deref()
                .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
        })
    }
}

impl WeatherSource for NwsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Nws
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?.to_ascii_uppercase();
        let user_agent = source
            .setting("user_agent")
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());
        Ok(
            HttpRequest::get(format!("{BASE_URL}/{station}/observations/latest"))
                .with_header("user-agent", user_agent)
                .with_header("accept", "application/geo+json"),
        )
    }

    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let feature: NwsFeature = parse_json(self.kind(), body)?;
        let props = feature.properties;
        let reported = props.reported_station();
        check_station(self.kind(), source.station(), reported)?;

        let observed_at =
            ctx.observation_time(self.kind(), TimeCandidates::text(props.timestamp.as_deref()))?;

        let layers = props
            .cloud_layers
            .iter()
            .filter_map(|layer| {
                let cover = CloudCover::parse(layer.amount.as_deref()?)?;
                Some((cover, layer.base.converted(units::height_ft)))
            })
            .collect::<Vec<_>>();
        let ceiling = layers
            .iter()
            .filter(|(cover, _)| cover.forms_ceiling())
            .filter_map(|(_, base)| *base)
            .min_by(f64::total_cmp);
        let cover = layers.iter().map(|(cover, _)| *cover).max();
        let pressure = props
            .sea_level_pressure
            .converted(units::pressure_inhg)
            .or_else(|| props.barometric_pressure.converted(units::pressure_inhg));

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(Field::Temperature, props.temperature.converted(units::temperature_c))
            .number(Field::Dewpoint, props.dewpoint.converted(units::temperature_c))
            .number(Field::Humidity, props.relative_humidity.plain())
            .number(Field::Pressure, pressure)
            .number(
                Field::Precipitation,
                props.precipitation_last_hour.converted(units::length_in),
            )
            .number(Field::Visibility, props.visibility.converted(units::distance_sm))
            .number(Field::Ceiling, ceiling)
            .cloud_cover(cover)
            .number(Field::WindSpeed, props.wind_speed.converted(units::speed_kt))
            .number(Field::WindDirection, props.wind_direction.plain())
            .number(Field::WindGust, props.wind_gust.converted(units::speed_kt))
            .raw_report(props.raw_message.clone())
            .derive_humidity();
        if let Some(station) = reported {
            builder.station(station.to_ascii_uppercase());
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{assert_close, ctx};
    use crate::data_source::SourceErrorKind;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new("nws").with_station("KSPB")
    }

    const BODY: &str = r#"{"type":"Feature","properties":{
        "station":"https://api.weather.gov/stations/KSPB",
        "timestamp":"2024-01-15T12:53:00+00:00",
        "rawMessage":"KSPB 151253Z AUTO 27010KT 10SM BKN040 05/01 A3000",
        "temperature":{"unitCode":"wmoUnit:degC","value":5.0,"qualityControl":"V"},
        "dewpoint":{"unitCode":"wmoUnit:degC","value":1.0,"qualityControl":"V"},
        "relativeHumidity":{"unitCode":"wmoUnit:percent","value":75.3,"qualityControl":"V"},
        "windDirection":{"unitCode":"wmoUnit:degree_(angle)","value":270,"qualityControl":"V"},
        "windSpeed":{"unitCode":"wmoUnit:km_h-1","value":18.52,"qualityControl":"V"},
        "windGust":{"unitCode":"wmoUnit:km_h-1","value":null,"qualityControl":"Z"},
        "barometricPressure":{"unitCode":"wmoUnit:Pa","value":101590,"qualityControl":"V"},
        "seaLevelPressure":{"unitCode":"wmoUnit:Pa","value":null,"qualityControl":"Z"},
        "visibility":{"unitCode":"wmoUnit:m","value":16090,"qualityControl":"C"},
        "precipitationLastHour":{"unitCode":"wmoUnit:mm","value":null,"qualityControl":"Z"},
        "cloudLayers":[{"base":{"unitCode":"wmoUnit:m","value":1220},"amount":"BKN"}]
    }}"#;

    #[test]
    fn request_sends_user_agent() {
        let request = NwsAdapter
            .build_request(&descriptor().with_setting("user_agent", "ops@example.org"), 0)
            .expect("request builds");
        assert_eq!(request.url, "https://api.weather.gov/stations/KSPB/observations/latest");
        assert_eq!(request.header("user-agent"), Some("ops@example.org"));
    }

    #[test]
    fn converts_declared_unit_codes() {
        let snapshot = NwsAdapter.parse(BODY, &descriptor(), &ctx());

        assert_eq!(snapshot.station.as_deref(), Some("KSPB"));
        assert_close(snapshot.wind.speed.as_f64(), 10.0);
        assert_close(snapshot.pressure.as_f64(), 30.0);
        assert_close(snapshot.visibility.as_f64(), 10.0);
        assert_close(snapshot.ceiling.as_f64(), 4_002.6);
        assert_eq!(snapshot.cloud_cover.as_text(), Some("BKN"));
        assert!(!snapshot.wind.gust.is_valid);
        assert!(!snapshot.precipitation.is_valid);
        assert_eq!(snapshot.temperature.observation_time, Some(1_705_323_180));
    }

    #[test]
    fn failed_quality_control_is_dropped() {
        let body = BODY.replace(
            r#""value":5.0,"qualityControl":"V""#,
            r#""value":55.0,"qualityControl":"X""#,
        );
        let snapshot = NwsAdapter.parse(&body, &descriptor(), &ctx());
        assert!(!snapshot.temperature.is_valid);
    }

    #[test]
    fn other_station_is_rejected() {
        let error = NwsAdapter
            .try_parse(BODY, &SourceDescriptor::new("nws").with_station("KPDX"), &ctx())
            .expect_err("wrong station");
        assert_eq!(error.kind(), SourceErrorKind::Rejected);
    }
}
