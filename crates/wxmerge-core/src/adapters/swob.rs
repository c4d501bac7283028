use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::SourceDescriptor;
use crate::data_source::{check_station, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Field, Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::parsing::number_from_str;
use crate::units;
use crate::SourceKind;

const BASE_URL: &str = "https://dd.weather.gc.ca/observations/swob-ml/latest";

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
    kind: SourceKind::Swob,
    fields: FIELDS,
    update_frequency_secs: 300,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "none",
    wire_format: "xml",
};

type Converter = fn(f64, &str) -> Option<f64>;

const ELEMENTS: &[(Field, &[&str], Converter)] = &[
    (Field::Temperature, &["air_temp"], units::temperature_c),
    (Field::Dewpoint, &["dwpt_temp"], units::temperature_c),
    (Field::Humidity, &["rel_hum"], as_reported),
    (Field::Pressure, &["mslp", "stn_pres"], units::pressure_inhg),
    (
        Field::Precipitation,
        &["pcpn_amt_pst1hr", "pcpn_amt_pst6hrs"],
        units::length_in,
    ),
    (Field::Visibility, &["vis"], units::distance_sm),
    (
        Field::WindSpeed,
        &["avg_wnd_spd_10m_pst10mts", "avg_wnd_spd_10m_pst2mts", "avg_wnd_spd_pst10mts"],
        units::speed_kt,
    ),
    (
        Field::WindDirection,
        &["avg_wnd_dir_10m_pst10mts", "avg_wnd_dir_10m_pst2mts", "avg_wnd_dir_pst10mts"],
        as_reported,
    ),
    (
        Field::WindGust,
        &["max_wnd_gst_spd_10m_pst10mts", "max_wnd_spd_10m_pst10mts"],
        units::speed_kt,
    ),
];

fn as_reported(value: f64, _uom: &str) -> Option<f64> {
    Some(value)
}

/// Environment and Climate Change Canada SWOB-ML station observations.
///
/// Every `<element name=".." uom=".." value=".."/>` declares its own unit;
/// `MSNG` marks a missing value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwobAdapter;

#[derive(Debug, Clone, PartialEq)]
struct SwobElement {
    uom: String,
    value: String,
}

fn element_attributes(start: &BytesStart<'_>) -> Result<Option<(String, SwobElement)>, SourceError> {
    let mut name = None;
    let mut uom = String::new();
    let mut value = None;
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|error| SourceError::parse(format!("malformed swob attribute: {error}")))?;
        let text = String::from_utf8_lossy(&attribute.value).trim().to_owned();
        match attribute.key.local_name().as_ref() {
            b"name" => name = Some(text),
            b"uom" => uom = text,
            b"value" => value = Some(text),
            _ => {}
        }
    }
    Ok(name.zip(value).map(|(name, value)| (name, SwobElement { uom, value })))
}

/// Collects every named element. The first occurrence of a name wins.
fn collect_elements(body: &str) -> Result<BTreeMap<String, SwobElement>, SourceError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut elements = BTreeMap::new();
    let mut saw_root = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                saw_root = true;
                if start.local_name().as_ref() == b"element" {
                    if let Some((name, element)) = element_attributes(&start)? {
                        elements.entry(name).or_insert(element);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(SourceError::parse(format!(
                    "malformed swob document at byte {}: {error}",
                    reader.buffer_position()
                )))
            }
        }
    }
    if !saw_root {
        return Err(SourceError::parse("swob response is not an XML document"));
    }
    Ok(elements)
}

impl WeatherSource for SwobAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Swob
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?.to_ascii_uppercase();
        let report_type = source
            .setting("report_type")
            .map(|kind| kind.to_ascii_uppercase())
            .unwrap_or_else(|| String::from("AUTO"));
        Ok(HttpRequest::get(format!(
            "{BASE_URL}/{station}-{report_type}-swob.xml"
        )))
    }

    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let elements = collect_elements(body)?;
        if elements.is_empty() {
            return Err(SourceError::parse("swob document has no observation elements"));
        }
        let text = |name: &str| {
            elements
                .get(name)
                .map(|element| element.value.as_str())
                .filter(|value| !crate::parsing::is_sentinel(value))
        };

        let reported = text("icao_stn_id").or_else(|| text("tc_id"));
        check_station(self.kind(), source.station(), reported)?;
        let observed_at = ctx.observation_time(self.kind(), TimeCandidates::text(text("date_tm")))?;

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder.observed_at(observed_at);
        for (field, names, convert) in ELEMENTS {
            let value = names.iter().find_map(|name| {
                let element = elements.get(*name)?;
                convert(number_from_str(&element.value)?, &element.uom)
            });
            builder.number(*field, value);
        }
        builder.derive_humidity();
        if let Some(station) = reported {
            builder.station(station.to_ascii_uppercase());
        }
        Ok(builder.build())
    }
}
