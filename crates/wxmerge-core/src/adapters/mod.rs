//! # Source Adapters
//!
//! One [`WeatherSource`](crate::WeatherSource) per upstream format.
//!
//! | Adapter | Wire format | Auth | Cadence | Authoritative for |
//! |---------|-------------|------|---------|-------------------|
//! | [`TempestAdapter`] | JSON | token | 60 s | – |
//! | [`AmbientAdapter`] | JSON | API + application key | 60 s | – |
//! | [`WeatherLinkAdapter`] | JSON | key + HMAC signature | 300 s | – |
//! | [`PwsWeatherAdapter`] | JSON | client id + secret | 300 s | – |
//! | [`SynopticDataAdapter`] | JSON | token | 300 s | – |
//! | [`MetarAdapter`] | JSON | none | 1800 s | visibility, ceiling, cloud cover |
//! | [`MetarTextAdapter`] | text | none | 1800 s | visibility, ceiling, cloud cover |
//! | [`NwsAdapter`] | GeoJSON | User-Agent | 900 s | – |
//! | [`SwobAdapter`] | XML | none | 300 s | – |
//! | [`OpenMeteoAdapter`] | JSON | none | 900 s | – |
//! | [`EcowittAdapter`] | JSON | application + API key | 60 s | – |
//! | [`FederatedAdapter`] | canonical JSON | bearer secret | 300 s | – |

mod ambient;
mod ecowitt;
mod federated;
pub mod metar_decode;
mod metar;
mod metar_text;
mod nws;
mod openmeteo;
mod pwsweather;
mod swob;
mod synopticdata;
mod tempest;
mod weatherlink;

pub use ambient::AmbientAdapter;
pub use ecowitt::EcowittAdapter;
pub use federated::FederatedAdapter;
pub use metar::MetarAdapter;
pub use metar_text::MetarTextAdapter;
pub use nws::NwsAdapter;
pub use openmeteo::OpenMeteoAdapter;
pub use pwsweather::PwsWeatherAdapter;
pub use swob::SwobAdapter;
pub use synopticdata::SynopticDataAdapter;
pub use tempest::TempestAdapter;
pub use weatherlink::WeatherLinkAdapter;

use crate::domain::Field;

/// Personal weather station coverage: no visibility or sky condition.
pub(crate) const STATION_FIELDS: &[Field] = &[
    Field::Temperature,
    Field::Dewpoint,
    Field::Humidity,
    Field::Pressure,
    Field::Precipitation,
    Field::WindSpeed,
    Field::WindDirection,
    Field::WindGust,
];

pub(crate) const ALL_FIELDS: &[Field] = &Field::ALL;

/// Fields only an observer or ceilometer reports reliably.
pub(crate) const AVIATION_PREFERRED: &[Field] =
    &[Field::Visibility, Field::Ceiling, Field::CloudCover];

#[cfg(test)]
pub(crate) mod test_support {
    use crate::data_source::ParseContext;

    /// 2024-01-15T13:00:00Z.
    pub(crate) const FETCH_TIME: i64 = 1_705_323_600;

    pub(crate) fn ctx() -> ParseContext {
        ParseContext::new(FETCH_TIME)
    }

    pub(crate) fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap_or(f64::NAN);
        assert!(
            (actual - expected).abs() < 0.05,
            "expected {expected}, got {actual}"
        );
    }
}
