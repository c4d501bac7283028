use serde::Deserialize;
use serde_json::Value;

use crate::adapters::STATION_FIELDS;
use crate::config::SourceDescriptor;
use crate::data_source::{parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::{json_number, lenient_f64, lenient_text};
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://api.ecowitt.net/api/v3/device/real_time";

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Ecowitt,
    fields: STATION_FIELDS,
    update_frequency_secs: 60,
    max_age_multiple: 5,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "application key + api key",
    wire_format: "json",
};

/// Ecowitt cloud API v3 real-time data. Each value carries its own unit
/// label and observation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcowittAdapter;

#[derive(Debug, Deserialize)]
struct EcowittEnvelope {
    #[serde(default, deserialize_with = "lenient_f64")]
    code: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    msg: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    time: Option<f64>,
    #[serde(default)]
    data: Value,
}

/// One `{"time": .., "unit": .., "value": ..}` leaf.
struct EcowittValue<'a> {
    value: Option<f64>,
    unit: &'a str,
    time: Option<f64>,
}

fn leaf<'a>(data: &'a Value, path: &[&str]) -> Option<EcowittValue<'a>> {
    let node = path.iter().try_fold(data, |node, key| node.get(key))?;
    Some(EcowittValue {
        value: json_number(node, "value"),
        unit: node.get("unit").and_then(Value::as_str).unwrap_or(""),
        time: json_number(node, "time"),
    })
}

impl WeatherSource for EcowittAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Ecowitt
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn endpoint_identity(&self, source: &SourceDescriptor) -> String {
        source
            .setting("mac")
            .or_else(|| source.station().map(str::to_owned))
            .map(|mac| mac.to_ascii_uppercase())
            .unwrap_or_else(|| String::from("default"))
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let application_key = source.require("application_key")?;
        let api_key = source.require("api_key")?;
        let mac = match source.setting("mac") {
            Some(mac) => mac,
            None => source.require_station()?.to_owned(),
        };
        Ok(HttpRequest::get_with_query(
            BASE_URL,
            [
                ("application_key", application_key.as_str()),
                ("api_key", api_key.as_str()),
                ("mac", mac.as_str()),
                ("call_back", "all"),
            ],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        _source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let envelope: EcowittEnvelope = parse_json(self.kind(), body)?;
        match envelope.code {
            Some(code) if code == 0.0 => {}
            code => {
                return Err(SourceError::rejected(format!(
                    "ecowitt refused the request (code {}): {}",
                    code.map(|code| code.to_string()).unwrap_or_else(|| String::from("none")),
                    envelope.msg.as_deref().unwrap_or("no message")
                )))
            }
        }
        let data = &envelope.data;
        if !data.is_object() {
            return Err(SourceError::parse("ecowitt response has no data block"));
        }

        let temperature = leaf(data, &["outdoor", "temperature"]);
        let sample_time = temperature
            .as_ref()
            .and_then(|temperature| temperature.time)
            .or(envelope.time);
        let observed_at = ctx.observation_time(self.kind(), TimeCandidates::epoch(sample_time))?;

        let convert = |path: &[&str], to_canonical: fn(f64, &str) -> Option<f64>| {
            leaf(data, path).and_then(|found| to_canonical(found.value?, found.unit))
        };
        let plain = |path: &[&str]| leaf(data, path).and_then(|found| found.value);
        let pressure = convert(&["pressure", "relative"], units::pressure_inhg)
            .or_else(|| convert(&["pressure", "absolute"], units::pressure_inhg));
        let precipitation = convert(&["rainfall", "daily"], units::length_in)
            .or_else(|| convert(&["rainfall_piezo", "daily"], units::length_in));

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(
                Field::Temperature,
                temperature.and_then(|found| units::temperature_c(found.value?, found.unit)),
            )
            .number(
                Field::Dewpoint,
                convert(&["outdoor", "dew_point"], units::temperature_c),
            )
            .number(Field::Humidity, plain(&["outdoor", "humidity"]))
            .number(Field::Pressure, pressure)
            .number(Field::Precipitation, precipitation)
            .number(Field::WindSpeed, convert(&["wind", "wind_speed"], units::speed_kt))
            .number(Field::WindDirection, plain(&["wind", "wind_direction"]))
            .number(Field::WindGust, convert(&["wind", "wind_gust"], units::speed_kt))
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
        SourceDescriptor::new("ecowitt")
            .with_setting("application_key", "app")
            .with_setting("api_key", "key")
            .with_setting("mac", "00:11:22:33:44:55")
    }

    #[test]
    fn request_requires_keys_and_device() {
        let request = EcowittAdapter
            .build_request(&descriptor(), 0)
            .expect("request builds");
        assert!(request.url.contains("application_key=app&api_key=key"));
        assert!(request.url.contains("mac=00%3A11%3A22%3A33%3A44%3A55"));

        let source = SourceDescriptor::new("ecowitt")
            .with_setting("application_key", "app")
            .with_setting("api_key", "key");
        let error = EcowittAdapter
            .build_request(&source, 0)
            .expect_err("device required");
        assert_eq!(error.kind(), SourceErrorKind::Configuration);
    }

    #[test]
    fn converts_per_value_units() {
        let body = r#"{"code":0,"msg":"success","time":"1705323190","data":{
            "outdoor":{"temperature":{"time":"1705323180","unit":"ºF","value":"68.0"},
                       "dew_point":{"time":"1705323180","unit":"ºF","value":"50.0"},
                       "humidity":{"time":"1705323180","unit":"%","value":"52"}},
            "wind":{"wind_speed":{"time":"1705323180","unit":"mph","value":"10.0"},
                    "wind_gust":{"time":"1705323180","unit":"mph","value":"--"},
                    "wind_direction":{"time":"1705323180","unit":"º","value":"135"}},
            "pressure":{"relative":{"time":"1705323180","unit":"inHg","value":"29.92"}},
            "rainfall":{"daily":{"time":"1705323180","unit":"in","value":"0.05"}}}}"#;

        let snapshot = EcowittAdapter.parse(body, &descriptor(), &ctx());

        assert_close(snapshot.temperature.as_f64(), 20.0);
        assert_close(snapshot.dewpoint.as_f64(), 10.0);
        assert_close(snapshot.wind.speed.as_f64(), 8.69);
        assert!(!snapshot.wind.gust.is_valid);
        assert_eq!(snapshot.wind.direction.as_f64(), Some(135.0));
        assert_close(snapshot.pressure.as_f64(), 29.92);
        assert_eq!(snapshot.temperature.observation_time, Some(1_705_323_180));
    }

    #[test]
    fn degree_glyph_units_and_dash_sentinels() {
        let body = r#"{"code":0,"msg":"success","time":"1705323190","data":{
            "outdoor":{"temperature":{"time":"1705323180","unit":"℉","value":"68.0"},
                       "dew_point":{"time":"1705323180","unit":"℃","value":"10.0"},
                       "humidity":{"time":"1705323180","unit":"%","value":"--"}},
            "wind":{"wind_speed":{"time":"1705323180","unit":"mph","value":"--"},
                    "wind_direction":{"time":"1705323180","unit":"º","value":"--"}},
            "pressure":{"relative":{"time":"1705323180","unit":"inHg","value":"--"}}}}"#;

        let snapshot = EcowittAdapter.parse(body, &descriptor(), &ctx());

        assert_close(snapshot.temperature.as_f64(), 20.0);
        assert_close(snapshot.dewpoint.as_f64(), 10.0);
        assert!(snapshot.humidity.is_valid, "derived from temperature and dewpoint");
        assert!(!snapshot.wind.speed.is_valid);
        assert_eq!(snapshot.wind.speed.value, None);
        assert!(!snapshot.wind.direction.is_valid);
        assert_eq!(snapshot.pressure.value, None);
    }

    #[test]
    fn nonzero_code_is_rejected() {
        let body = r#"{"code":40010,"msg":"Illegal Application_Key Parameter","time":"1705323190","data":[]}"#;
        let error = EcowittAdapter
            .try_parse(body, &descriptor(), &ctx())
            .expect_err("refused");
        assert_eq!(error.kind(), SourceErrorKind::Rejected);
        assert!(error.message().contains("40010"));
    }
}
