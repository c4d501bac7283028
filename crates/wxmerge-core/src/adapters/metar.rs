use serde::Deserialize;

use crate::adapters::metar_decode::{self, CloudLayer};
use crate::adapters::{ALL_FIELDS, AVIATION_PREFERRED};
use crate::config::SourceDescriptor;
use crate::data_source::{
    check_station, parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource,
};
use crate::domain::{CloudCover, Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::{lenient_f64, lenient_text, parse_visibility_sm};
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://aviationweather.gov/api/data/metar";

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Metar,
    fields: ALL_FIELDS,
    update_frequency_secs: 1_800,
    max_age_multiple: 3,
    preferred_fields: AVIATION_PREFERRED,
    nearby_stations: true,
    auth: "none",
    wire_format: "json",
};

/// Structured METAR from the aviationweather.gov data API.
///
/// The structured fields win; the raw report only fills what they omit.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetarAdapter;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetarRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    icao_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    obs_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    report_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    dewp: Option<f64>,
    /// Degrees, or `"VRB"`.
    #[serde(default, deserialize_with = "lenient_f64")]
    wdir: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wspd: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wgst: Option<f64>,
    /// Statute miles as a number or text such as `"10+"`.
    #[serde(default, deserialize_with = "lenient_text")]
    visib: Option<String>,
    /// hPa
    #[serde(default, deserialize_with = "lenient_f64")]
    altim: Option<f64>,
    #[serde(default)]
    clouds: Vec<MetarCloud>,
    #[serde(default, deserialize_with = "lenient_text")]
    raw_ob: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetarCloud {
    #[serde(default, deserialize_with = "lenient_text")]
    cover: Option<String>,
    /// Feet AGL.
    #[serde(default, deserialize_with = "lenient_f64")]
    base: Option<f64>,
}

fn structured_layers(clouds: &[MetarCloud]) -> Vec<CloudLayer> {
    clouds
        .iter()
        .filter_map(|cloud| {
            let cover = CloudCover::parse(cloud.cover.as_deref()?)?;
            Some(CloudLayer {
                cover,
                base_ft: cloud.base,
            })
        })
        .collect()
}

impl WeatherSource for MetarAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Metar
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?.to_ascii_uppercase();
        Ok(HttpRequest::get_with_query(
            BASE_URL,
            [("ids", station.as_str()), ("format", "json")],
        ))
    }

    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let records: Vec<MetarRecord> = parse_json(self.kind(), body)?;
        let record = records
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::parse("metar response contains no reports"))?;

        let decoded = record
            .raw_ob
            .as_deref()
            .map(metar_decode::decode)
            .unwrap_or_default();
        let reported = record.icao_id.as_deref().or(decoded.station.as_deref());
        check_station(self.kind(), source.station(), reported)?;

        let candidates = TimeCandidates::epoch(record.obs_time)
            .with_text(record.report_time.as_deref())
            .with_day_time(decoded.day_time.as_deref());
        let observed_at = ctx.observation_time(self.kind(), candidates)?;

        let layers = structured_layers(&record.clouds);
        let ceiling = layers
            .iter()
            .filter(|layer| layer.cover.forms_ceiling())
            .filter_map(|layer| layer.base_ft)
            .min_by(f64::total_cmp);
        let cover = layers.iter().map(|layer| layer.cover).max();

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder
            .observed_at(observed_at)
            .number(Field::Temperature, record.temp)
            .number(Field::Dewpoint, record.dewp)
            .number(Field::Pressure, record.altim.map(units::hpa_to_inhg))
            .number(
                Field::Visibility,
                record.visib.as_deref().and_then(parse_visibility_sm),
            )
            .number(Field::Ceiling, ceiling)
            .cloud_cover(cover)
            .raw_report(record.raw_ob.clone());
        if let Some(speed) = record.wspd {
            builder
                .number(Field::WindSpeed, Some(speed))
                .number(Field::WindDirection, record.wdir)
                .number(Field::WindGust, record.wgst);
        }
        decoded.fill(&mut builder);
        if let Some(station) = reported {
            builder.station(station.to_ascii_uppercase());
        }
        Ok(builder.build())
    }
}
