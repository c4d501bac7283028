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

const BASE_URL: &str = "https://api.aerisapi.com/observations";

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
    kind: SourceKind::Pwsweather,
    fields: FIELDS,
    update_frequency_secs: 300,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "client id + client secret",
    wire_format: "json",
};

/// PWSWeather stations served through the Aeris observations API.
#[derive(Debug, Clone, Copy, Default)]
pub struct PwsWeatherAdapter;

#[derive(Debug, Deserialize)]
struct AerisEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<AerisError>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AerisError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl WeatherSource for PwsWeatherAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Pwsweather
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?;
        let client_id = source.require("client_id")?;
        let client_secret = source.require("client_secret")?;
        Ok(HttpRequest::get_with_query(
            &format!("{BASE_URL}/{}", urlencoding::encode(station)),
            [
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        _source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let envelope: AerisEnvelope = parse_json(self.kind(), body)?;
        if !envelope.success {
            let (code, description) = envelope
                .error
                .map(|error| (error.code, error.description))
                .unwrap_or_default();
            return Err(SourceError::parse(format!(
                "pwsweather request failed: {} {}",
                code.unwrap_or_default(),
                description.unwrap_or_default()
            )));
        }
        let ob = envelope
            .response
            .and_then(|response| response.get("ob").cloned())
            .filter(Value::is_object)
            .ok_or_else(|| SourceError::parse("pwsweather response has no observation"))?;

        let candidates = TimeCandidates::epoch(json_number(&ob, "timestamp"))
            .with_text(json_text(&ob, "dateTimeISO"));
        let observed_at = ctx.observation_time(self.kind(), candidates)?;
        let number = |key: &str| json_number(&ob, key);

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(Field::Temperature, number("tempC"))
            .number(Field::Dewpoint, number("dewpointC"))
            .number(Field::Humidity, number("humidity"))
            .number(Field::Pressure, number("pressureMB").map(units::hpa_to_inhg))
            .number(Field::Precipitation, number("precipMM").map(units::mm_to_inches))
            .number(
                Field::Visibility,
                number("visibilityKM").map(units::km_to_statute_miles),
            )
            .number(Field::WindSpeed, number("windSpeedKTS"))
            .number(Field::WindDirection, number("windDirDEG"))
            .number(Field::WindGust, number("windGustKTS"))
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
        SourceDescriptor::new("pwsweather")
            .with_station("PWS_KSPBHOME")
            .with_setting("client_id", "id")
            .with_setting("client_secret", "secret")
    }

    #[test]
    fn request_carries_client_credentials() {
        let request = PwsWeatherAdapter
            .build_request(&descriptor(), 0)
            .expect("request builds");
        assert!(request.url.contains("/observations/PWS_KSPBHOME?"));
        assert!(request.url.contains("client_id=id&client_secret=secret"));
    }

    #[test]
    fn converts_observation() {
        let body = r#"{"success":true,"error":null,"response":{"id":"PWS_KSPBHOME","ob":{
            "timestamp":1705323180,"tempC":4.5,"dewpointC":1.0,"humidity":78,"pressureMB":1013.25,
            "windSpeedKTS":6,"windDirDEG":200,"windGustKTS":null,"precipMM":2.54,"visibilityKM":16.09}}}"#;

        let snapshot = PwsWeatherAdapter.parse(body, &descriptor(), &ctx());

        assert_close(snapshot.temperature.as_f64(), 4.5);
        assert_close(snapshot.pressure.as_f64(), 29.92);
        assert_close(snapshot.precipitation.as_f64(), 0.1);
        assert_close(snapshot.visibility.as_f64(), 10.0);
        assert!(!snapshot.wind.gust.is_valid);
        assert!(snapshot.wind.is_complete());
    }

    #[test]
    fn api_error_is_a_parse_error() {
        let body = r#"{"success":false,"error":{"code":"invalid_client","description":"bad id"},"response":[]}"#;
        let error = PwsWeatherAdapter
            .try_parse(body, &descriptor(), &ctx())
            .expect_err("api error");
        assert_eq!(error.kind(), SourceErrorKind::Parse);
        assert!(error.message().contains("invalid_client"));
    }
}
