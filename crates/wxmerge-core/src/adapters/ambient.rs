use serde::Deserialize;
use serde_json::Value;

use crate::adapters::STATION_FIELDS;
use crate::config::SourceDescriptor;
use crate::data_source::{parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::{json_number, json_text};
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://rt.ambientweather.net/v1/devices";

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Ambient,
    fields: STATION_FIELDS,
    update_frequency_secs: 60,
    max_age_multiple: 5,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "api key + application key",
    wire_format: "json",
};

/// Ambient Weather device data (imperial units, `dateutc` in milliseconds).
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientAdapter;

/// Either the per-device record list or the device list with `lastData`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AmbientPayload {
    Records(Vec<Value>),
    Single(Value),
}

impl AmbientPayload {
    fn latest(self) -> Option<Value> {
        let record = match self {
            Self::Records(records) => records.into_iter().next()?,
            Self::Single(record) => record,
        };
        match record.get("lastData") {
            Some(last) if last.is_object() => Some(last.clone()),
            _ => record.is_object().then_some(record),
        }
    }
}

impl WeatherSource for AmbientAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Ambient
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn endpoint_identity(&self, source: &SourceDescriptor) -> String {
        source
            .setting("mac_address")
            .or_else(|| source.station().map(str::to_owned))
            .map(|mac| mac.to_ascii_uppercase())
            .unwrap_or_else(|| String::from("default"))
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let api_key = source.require("api_key")?;
        let application_key = source.require("application_key")?;
        let mac = match source.setting("mac_address") {
            Some(mac) => mac,
            None => source.require_station()?.to_owned(),
        };
        Ok(HttpRequest::get_with_query(
            &format!("{BASE_URL}/{mac}"),
            [
                ("apiKey", api_key.as_str()),
                ("applicationKey", application_key.as_str()),
                ("limit", "1"),
            ],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        _source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let payload: AmbientPayload = parse_json(self.kind(), body)?;
        let record = payload
            .latest()
            .ok_or_else(|| SourceError::parse("ambient response has no device records"))?;

        let candidates = TimeCandidates::epoch(json_number(&record, "dateutc"))
            .with_text(json_text(&record, "date"));
        let observed_at = ctx.observation_time(self.kind(), candidates)?;
        let number = |key: &str| json_number(&record, key);

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(
                Field::Temperature,
                number("tempf").map(units::fahrenheit_to_celsius),
            )
            .number(
                Field::Dewpoint,
                number("dewPoint").map(units::fahrenheit_to_celsius),
            )
            .number(Field::Humidity, number("humidity"))
            .number(
                Field::Pressure,
                number("baromrelin").or_else(|| number("baromabsin")),
            )
            .number(Field::Precipitation, number("dailyrainin"))
            .number(Field::WindSpeed, number("windspeedmph").map(units::mph_to_knots))
            .number(Field::WindDirection, number("winddir"))
            .number(Field::WindGust, number("windgustmph").map(units::mph_to_knots))
            .derive_humidity();
        Ok(builder.build())
    }
}
