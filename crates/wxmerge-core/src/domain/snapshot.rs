use serde::{Deserialize, Serialize};

use crate::domain::field::{CloudCover, Field};
use crate::domain::reading::{Reading, WindGroup};
use crate::units;
use crate::SourceKind;

/// One adapter's parsed output from a single fetch attempt.
///
/// A failed parse yields [`Snapshot::empty`], so merge code only ever checks
/// individual readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: SourceKind,
    /// Station that actually supplied the data (primary or an alternate).
    pub station: Option<String>,
    pub fetch_time: i64,
    pub temperature: Reading,
    pub dewpoint: Reading,
    pub humidity: Reading,
    pub pressure: Reading,
    pub precipitation: Reading,
    pub visibility: Reading,
    pub ceiling: Reading,
    pub cloud_cover: Reading,
    pub wind: WindGroup,
    pub raw_report: Option<String>,
    pub is_valid: bool,
}

impl Snapshot {
    pub fn empty(source: SourceKind, fetch_time: i64) -> Self {
        Self {
            source,
            station: None,
            fetch_time,
            temperature: Reading::missing(Field::Temperature, source),
            dewpoint: Reading::missing(Field::Dewpoint, source),
            humidity: Reading::missing(Field::Humidity, source),
            pressure: Reading::missing(Field::Pressure, source),
            precipitation: Reading::missing(Field::Precipitation, source),
            visibility: Reading::missing(Field::Visibility, source),
            ceiling: Reading::missing(Field::Ceiling, source),
            cloud_cover: Reading::missing(Field::CloudCover, source),
            wind: WindGroup::missing(source),
            raw_report: None,
            is_valid: false,
        }
    }

    pub fn reading(&self, field: Field) -> &Reading {
        match field {
            Field::Temperature => &self.temperature,
            Field::Dewpoint => &self.dewpoint,
            Field::Humidity => &self.humidity,
            Field::Pressure => &self.pressure,
            Field::Precipitation => &self.precipitation,
            Field::Visibility => &self.visibility,
            Field::Ceiling => &self.ceiling,
            Field::CloudCover => &self.cloud_cover,
            Field::WindSpeed => &self.wind.speed,
            Field::WindDirection => &self.wind.direction,
            Field::WindGust => &self.wind.gust,
        }
    }

    fn reading_mut(&mut self, field: Field) -> &mut Reading {
        match field {
            Field::Temperature => &mut self.temperature,
            Field::Dewpoint => &mut self.dewpoint,
            Field::Humidity => &mut self.humidity,
            Field::Pressure => &mut self.pressure,
            Field::Precipitation => &mut self.precipitation,
            Field::Visibility => &mut self.visibility,
            Field::Ceiling => &mut self.ceiling,
            Field::CloudCover => &mut self.cloud_cover,
            Field::WindSpeed => &mut self.wind.speed,
            Field::WindDirection => &mut self.wind.direction,
            Field::WindGust => &mut self.wind.gust,
        }
    }

    pub fn valid_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| self.reading(*field).is_valid)
            .collect()
    }

    /// Tags the snapshot with the station that supplied it.
    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }
}

/// Assembles a fresh [`Snapshot`] during a parse.
///
/// Values must already be in canonical units; the builder applies the
/// plausibility checks of [`Reading::number`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
    observed_at: Option<i64>,
}

impl SnapshotBuilder {
    pub fn new(source: SourceKind, fetch_time: i64) -> Self {
        Self {
            snapshot: Snapshot::empty(source, fetch_time),
            observed_at: None,
        }
    }

    /// Observation time applied to readings that don't carry their own.
    pub fn observed_at(&mut self, observed_at: i64) -> &mut Self {
        self.observed_at = Some(observed_at);
        self
    }

    pub fn station(&mut self, station: impl Into<String>) -> &mut Self {
        self.snapshot.station = Some(station.into());
        self
    }

    pub fn number(&mut self, field: Field, value: Option<f64>) -> &mut Self {
        let observed_at = self.observed_at;
        self.number_at(field, value, observed_at)
    }

    pub fn number_at(
        &mut self,
        field: Field,
        value: Option<f64>,
        observed_at: Option<i64>,
    ) -> &mut Self {
        let source = self.snapshot.source;
        let reading = match value {
            Some(value) => Reading::number(field, value, observed_at, source),
            None => Reading::missing(field, source),
        };
        *self.snapshot.reading_mut(field) = reading;
        self
    }

    /// Fills a field only when it is still missing.
    pub fn fill(&mut self, field: Field, value: Option<f64>) -> &mut Self {
        if !self.snapshot.reading(field).is_valid {
            self.number(field, value);
        }
        self
    }

    pub fn cloud_cover(&mut self, cover: Option<CloudCover>) -> &mut Self {
        let observed_at = self.observed_at;
        self.cloud_cover_at(cover, observed_at)
    }

    pub fn cloud_cover_at(&mut self, cover: Option<CloudCover>, observed_at: Option<i64>) -> &mut Self {
        let source = self.snapshot.source;
        self.snapshot.cloud_cover = match cover {
            Some(cover) => Reading::cloud_cover(cover, observed_at, source),
            None => Reading::missing(Field::CloudCover, source),
        };
        self
    }

    pub fn raw_report(&mut self, raw: Option<String>) -> &mut Self {
        self.snapshot.raw_report = raw.filter(|raw| !raw.trim().is_empty());
        self
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.snapshot.reading(field).is_valid
    }

    /// Current valid numeric value of a field.
    pub fn value(&self, field: Field) -> Option<f64> {
        let reading = self.snapshot.reading(field);
        if reading.is_valid {
            reading.as_f64()
        } else {
            None
        }
    }

    /// Derives relative humidity from temperature and dewpoint when the
    /// payload did not report it.
    pub fn derive_humidity(&mut self) -> &mut Self {
        if self.is_set(Field::Humidity) {
            return self;
        }
        let derived = self
            .value(Field::Temperature)
            .zip(self.value(Field::Dewpoint))
            .and_then(|(temperature, dewpoint)| units::relative_humidity(temperature, dewpoint));
        if derived.is_some() {
            let observed_at = self.snapshot.temperature.observation_time.or(self.observed_at);
            self.number_at(Field::Humidity, derived, observed_at);
        }
        self
    }

    pub fn build(self) -> Snapshot {
        let mut snapshot = self.snapshot;
        snapshot.is_valid = Field::ALL
            .into_iter()
            .any(|field| snapshot.reading(field).is_valid);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_only_invalid_readings() {
        let snapshot = Snapshot::empty(SourceKind::Nws, 1_700_000_000);
        assert!(!snapshot.is_valid);
        assert!(snapshot.valid_fields().is_empty());
        assert!(!snapshot.wind.is_complete());
    }

    #[test]
    fn builder_applies_default_observation_time_and_validity() {
        let mut builder = SnapshotBuilder::new(SourceKind::Tempest, 2_000);
        builder
            .observed_at(1_940)
            .number(Field::Temperature, Some(21.5))
            .number(Field::Humidity, None)
            .number_at(Field::WindGust, Some(12.0), Some(1_900));
        let snapshot = builder.build();

        assert!(snapshot.is_valid);
        assert_eq!(snapshot.temperature.observation_time, Some(1_940));
        assert_eq!(snapshot.wind.gust.observation_time, Some(1_900));
        assert!(!snapshot.humidity.is_valid);
        assert_eq!(snapshot.valid_fields(), vec![Field::Temperature, Field::WindGust]);
    }

    #[test]
    fn fill_does_not_overwrite_valid_readings() {
        let mut builder = SnapshotBuilder::new(SourceKind::Metar, 10);
        builder.observed_at(5).number(Field::Pressure, Some(29.92));
        builder.fill(Field::Pressure, Some(30.10)).fill(Field::Visibility, Some(7.0));
        let snapshot = builder.build();

        assert_eq!(snapshot.pressure.as_f64(), Some(29.92));
        assert_eq!(snapshot.visibility.as_f64(), Some(7.0));
    }

    #[test]
    fn humidity_is_derived_only_when_absent() {
        let mut builder = SnapshotBuilder::new(SourceKind::Metar, 10);
        builder
            .observed_at(5)
            .number(Field::Temperature, Some(20.0))
            .number(Field::Dewpoint, Some(20.0))
            .derive_humidity();
        assert_eq!(builder.value(Field::Humidity).map(f64::round), Some(100.0));

        let mut builder = SnapshotBuilder::new(SourceKind::Tempest, 10);
        builder
            .number(Field::Temperature, Some(20.0))
            .number(Field::Dewpoint, Some(10.0))
            .number(Field::Humidity, Some(55.0))
            .derive_humidity();
        assert_eq!(builder.value(Field::Humidity), Some(55.0));
    }
}
