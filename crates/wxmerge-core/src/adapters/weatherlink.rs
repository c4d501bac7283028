use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::adapters::STATION_FIELDS;
use crate::config::SourceDescriptor;
use crate::data_source::{parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::json_number;
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://api.weatherlink.com/v2/current";

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Weatherlink,
    fields: STATION_FIELDS,
    update_frequency_secs: 300,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "api key + HMAC-SHA256 signature",
    wire_format: "json",
};

type HmacSha256 = Hmac<Sha256>;

/// Davis WeatherLink v2 current conditions (imperial units).
///
/// Each sensor reports its own data block; the console, ISS, and barometer
/// are merged with the first sensor that reports a value winning.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherLinkAdapter;

#[derive(Debug, Deserialize)]
struct WeatherLinkPayload {
    #[serde(default)]
    sensors: Vec<WeatherLinkSensor>,
}

#[derive(Debug, Deserialize)]
struct WeatherLinkSensor {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

/// Signs the request parameters, sorted by name, as `name1value1name2value2...`.
pub(crate) fn signature(
    api_key: &str,
    api_secret: &str,
    station_id: &str,
    timestamp: i64,
) -> Result<String, SourceError> {
    let message = format!("api-key{api_key}station-id{station_id}t{timestamp}");
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|error| SourceError::configuration(format!("invalid api_secret: {error}")))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn first_number(records: &[Value], keys: &[&str]) -> Option<f64> {
    records
        .iter()
        .find_map(|record| keys.iter().find_map(|key| json_number(record, key)))
}

impl WeatherSource for WeatherLinkAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Weatherlink
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?;
        let api_key = source.require("api_key")?;
        let api_secret = source.require("api_secret")?;
        let timestamp = now.to_string();
        let signature = signature(&api_key, &api_secret, station, now)?;
        Ok(HttpRequest::get_with_query(
            &format!("{BASE_URL}/{station}"),
            [
                ("api-key", api_key.as_str()),
                ("t", timestamp.as_str()),
                ("api-signature", signature.as_str()),
            ],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        _source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let payload: WeatherLinkPayload = parse_json(self.kind(), body)?;
        let records = payload
            .sensors
            .into_iter()
            .filter_map(|sensor| sensor.data.into_iter().next())
            .map(Value::Object)
            .collect::<Vec<_>>();
        if records.is_empty() {
            return Err(SourceError::parse("weatherlink response has no sensor data"));
        }

        let latest = records
            .iter()
            .filter_map(|record| json_number(record, "ts"))
            .max_by(f64::total_cmp);
        let observed_at = ctx.observation_time(self.kind(), TimeCandidates::epoch(latest))?;
        let number = |keys: &[&str]| first_number(&records, keys);

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(
                Field::Temperature,
                number(&["temp", "temp_out"]).map(units::fahrenheit_to_celsius),
            )
            .number(
                Field::Dewpoint,
                number(&["dew_point", "dew_point_out"]).map(units::fahrenheit_to_celsius),
            )
            .number(Field::Humidity, number(&["hum", "hum_out"]))
            .number(Field::Pressure, number(&["bar_sea_level", "bar"]))
            .number(
                Field::Precipitation,
                number(&["rainfall_daily_in", "rain_day_in"]),
            )
            .number(
                Field::WindSpeed,
                number(&["wind_speed_last", "wind_speed"]).map(units::mph_to_knots),
            )
            .number(Field::WindDirection, number(&["wind_dir_last", "wind_dir"]))
            .number(
                Field::WindGust,
                number(&["wind_speed_hi_last_10_min", "wind_gust_10_min"]).map(units::mph_to_knots),
            )
            .derive_humidity();
        Ok(builder.build())
    }
}
