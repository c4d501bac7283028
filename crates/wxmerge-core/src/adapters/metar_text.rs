use crate::adapters::metar_decode;
use crate::adapters::{ALL_FIELDS, AVIATION_PREFERRED};
use crate::config::SourceDescriptor;
use crate::data_source::{check_station, ParseContext, SourceCapabilities, SourceError, WeatherSource};
use crate::domain::{Snapshot, SnapshotBuilder};
use crate::http_client::HttpRequest;
use crate::obs_time::TimeCandidates;
use crate::SourceKind;

const BASE_URL: &str = "https://tgftp.nws.noaa.gov/data/observations/metar/stations";

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::MetarText,
    fields: ALL_FIELDS,
    update_frequency_secs: 1_800,
    max_age_multiple: 3,
    preferred_fields: AVIATION_PREFERRED,
    nearby_stations: true,
    auth: "none",
    wire_format: "text",
};

/// NOAA station text files: a `YYYY/MM/DD HH:MM` header line followed by the
/// raw report.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetarTextAdapter;

/// Splits the optional timestamp header from the report body.
fn split_header(body: &str) -> (Option<&str>, String) {
    let mut lines = body.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(first) = lines.next() else {
        return (None, String::new());
    };
    let is_header = first.len() >= 10
        && first.as_bytes()[4] == b'/'
        && first.as_bytes()[..4].iter().all(u8::is_ascii_digit);
    if is_header {
        (Some(first), lines.collect::<Vec<_>>().join(" "))
    } else {
        let report = std::iter::once(first).chain(lines).collect::<Vec<_>>();
        (None, report.join(" "))
    }
}

impl WeatherSource for MetarTextAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::MetarText
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let station = source.require_station()?.to_ascii_uppercase();
        Ok(HttpRequest::get(format!("{BASE_URL}/{station}.TXT")))
    }

    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let (header, report) = split_header(body);
        if report.is_empty() {
            return Err(SourceError::parse("metar text file contains no report"));
        }
        let decoded = metar_decode::decode(&report);
        if decoded.station.is_none() {
            return Err(SourceError::parse(format!(
                "metar text is not a recognisable report: '{report}'"
            )));
        }
        check_station(self.kind(), source.station(), decoded.station.as_deref())?;

        let candidates = TimeCandidates::text(header).with_day_time(decoded.day_time.as_deref());
        let observed_at = ctx.observation_time(self.kind(), candidates)?;

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder.observed_at(observed_at);
        decoded.fill(&mut builder);
        builder.raw_report(Some(report.clone()));
        if let Some(station) = &decoded.station {
            builder.station(station.clone());
        }
        Ok(builder.build())
    }
}
