use crate::adapters::ALL_FIELDS;
use crate::config::SourceDescriptor;
use crate::data_source::{
    check_station, parse_json, ParseContext, SourceCapabilities, SourceError, WeatherSource,
};
use crate::domain::{CloudCover, Field, MergedAirportWeather, Snapshot, SnapshotBuilder};
use crate::http_client::{HttpAuth, HttpRequest};
use crate::obs_time::TimeCandidates;
use crate::SourceKind;

const CAPABILITIES: SourceCapabilities = SourceCapabilities {
    kind: SourceKind::Federated,
    fields: ALL_FIELDS,
    update_frequency_secs: 300,
    max_age_multiple: 3,
    preferred_fields: &[],
    nearby_stations: false,
    auth: "bearer secret",
    wire_format: "canonical json",
};

/// A peer instance's merged result for one of its airports.
///
/// The peer serves the same canonical shape this engine produces, so values
/// are already in canonical units and keep their original observation times.
#[derive(Debug, Clone, Copy, Default)]
pub struct FederatedAdapter;

impl WeatherSource for FederatedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Federated
    }

    fn capabilities(&self) -> SourceCapabilities {
        CAPABILITIES
    }

    fn endpoint_identity(&self, source: &SourceDescriptor) -> String {
        let peer = source.setting("url").unwrap_or_default();
        let airport = source.station().unwrap_or("default").to_ascii_uppercase();
        format!("{}#{airport}", peer.trim_end_matches('/'))
    }

    fn build_request(&self, source: &SourceDescriptor, _now: i64) -> Result<HttpRequest, SourceError> {
        let peer = source.require("url")?;
        let secret = source.require("secret")?;
        let airport = source.require_station()?;
        Ok(HttpRequest::get(format!(
            "{}/api/v1/weather/{}",
            peer.trim_end_matches('/'),
            urlencoding::encode(airport)
        ))
        .with_auth(&HttpAuth::BearerToken(secret)))
    }

    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError> {
        let peer: MergedAirportWeather = parse_json(self.kind(), body)?;
        check_station(self.kind(), source.station(), Some(peer.airport.as_str()))?;
        let generated_at = ctx.observation_time(
            self.kind(),
            TimeCandidates::epoch(Some(peer.generated_at as f64)),
        )?;

        let mut builder = SnapshotBuilder::new(self.kind(), ctx.fetch_time);
        builder.observed_at(generated_at);
        for field in Field::ALL {
            let Some(reading) = peer.reading(field).filter(|reading| reading.is_valid) else {
                continue;
            };
            let observed_at = reading
                .observation_time
                .and_then(|time| ctx.observed_at_strict(TimeCandidates::epoch(Some(time as f64))));
            if observed_at.is_none() {
                continue;
            }
            if field.is_categorical() {
                let cover = reading.as_text().and_then(CloudCover::parse);
                builder.cloud_cover_at(cover, observed_at);
            } else {
                builder.number_at(field, reading.as_f64(), observed_at);
            }
        }
        builder
            .raw_report(peer.raw_report.clone())
            .station(peer.airport.to_ascii_uppercase());
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{assert_close, ctx};
    use crate::data_source::SourceErrorKind;

    fn descriptor() -> SourceDescriptor {
        SourceDescriptor::new("federated")
            .with_station("KSPB")
            .with_setting("url", "https://peer.example.org/")
            .with_setting("secret", "shared")
    }

    const BODY: &str = r#"{
        "airport": "KSPB",
        "generated_at": 1705323500,
        "fields": {
            "temperature": {"reading": {"value": 4.0, "unit": "degC", "observation_time": 1705323180,
                            "source": "tempest", "is_valid": true}},
            "cloud_cover": {"reading": {"value": "BKN", "unit": "category", "observation_time": 1705323180,
                            "source": "metar", "is_valid": true}},
            "visibility": {"reading": {"value": null, "unit": "SM", "observation_time": null,
                            "source": "metar", "is_valid": false}},
            "pressure": {"reading": {"value": 30.01, "unit": "inHg", "observation_time": 1705100000,
                            "source": "nws", "is_valid": true}}
        },
        "raw_report": "KSPB 151253Z 00000KT 10SM BKN040 04/01 A3001",
        "overall": {"level": "fresh", "age_secs": 420, "threshold_secs": 300},
        "sources": []
    }"#;

    #[test]
    fn request_uses_bearer_secret() {
        let request = FederatedAdapter
            .build_request(&descriptor(), 0)
            .expect("request builds");
        assert_eq!(request.url, "https://peer.example.org/api/v1/weather/KSPB");
        assert_eq!(request.header("authorization"), Some("Bearer shared"));

        let error = FederatedAdapter
            .build_request(&SourceDescriptor::new("federated").with_station("KSPB"), 0)
            .expect_err("peer url required");
        assert_eq!(error.kind(), SourceErrorKind::Configuration);
    }

    #[test]
    fn keeps_peer_values_and_observation_times() {
        let snapshot = FederatedAdapter.parse(BODY, &descriptor(), &ctx());

        assert_eq!(snapshot.source, SourceKind::Federated);
        assert_close(snapshot.temperature.as_f64(), 4.0);
        assert_eq!(snapshot.temperature.observation_time, Some(1_705_323_180));
        assert_eq!(snapshot.cloud_cover.as_text(), Some("BKN"));
        assert!(!snapshot.visibility.is_valid);
        assert!(!snapshot.pressure.is_valid, "day-old peer value is dropped");
        assert!(snapshot.raw_report.is_some());
    }

    #[test]
    fn other_airport_is_rejected() {
        let source = descriptor().with_station("KPDX");
        let error = FederatedAdapter
            .try_parse(BODY, &source, &ctx())
            .expect_err("wrong airport");
        assert_eq!(error.kind(), SourceErrorKind::Rejected);
    }
}
