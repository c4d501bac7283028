use serde::Deserialize;

use crate::adapters::STATION_FIELDS;
use crate::config::SourceDescriptor;
use crate::data_source::{parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::lenient_f64;
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://swd.weatherflow.com/swd/rest/observations/station";

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Tempest,
    fields: STATION_FIELDS,
    update_frequency_secs: 60,
    max_age_multiple: 5,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "token",
    wire_format: "json",
};

/// WeatherFlow Tempest station observations (metric units).
#[derive(Debug, Clone, Copy, Default)]
pub struct TempestAdapter;

#[derive(Debug, Deserialize)]
struct TempestPayload {
    #[serde(default)]
    obs: Vec<TempestObservation>,
}

#[derive(Debug, Default, Deserialize)]
struct TempestObservation {
    #[serde(default, deserialize_with = "lenient_f64")]
    timestamp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    air_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    dew_point: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    relative_humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    sea_level_pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    station_pressure: Option<f64>,
    /// m/s
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_avg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_direction: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_gust: Option<f64>,
    /// mm since local midnight
    #[serde(default, deserialize_with = "lenient_f64")]
    precip_accum_local_day: Option<f64>,
}

impl WeatherSource for TempestAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Tempest
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?;
        let token = source.require("token")?;
        Ok(HttpRequest::get_with_query(
            &format!("{BASE_URL}/{station}"),
            [("token", token.as_str())],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        _source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let payload: TempestPayload = parse_json(self.kind(), body)?;
        let obs = payload
            .obs
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::parse("tempest response has no observations"))?;

        let observed_at = ctx.observation_time(self.kind(), TimeCandidates::epoch(obs.timestamp))?;
        let pressure = obs.sea_level_pressure.or(obs.station_pressure);

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(Field::Temperature, obs.air_temperature)
            .number(Field::Dewpoint, obs.dew_point)
            .number(Field::Humidity, obs.relative_humidity)
            .number(Field::Pressure, pressure.map(units::hpa_to_inhg))
            .number(
                Field::Precipitation,
                obs.precip_accum_local_day.map(units::mm_to_inches),
            )
            .number(Field::WindSpeed, obs.wind_avg.map(units::mps_to_knots))
            .number(Field::WindDirection, obs.wind_direction)
            .number(Field::WindGust, obs.wind_gust.map(units::mps_to_knots))
            .derive_humidity();
        Ok(builder.build())
    }
}
