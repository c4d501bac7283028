//! # Domain Models
//!
//! Canonical weather types shared by adapters, the merge, and consumers.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Field`] | Canonical weather field (temperature, visibility, wind speed, ...) |
//! | [`Unit`] | Canonical unit; every reading carries its field's unit |
//! | [`CloudCover`] | Sky cover category (`SKC` ... `OVC`, `VV`) |
//! | [`Reading`] | One observation, explicitly valid or invalid |
//! | [`WindGroup`] | Speed, direction, and gust from one source |
//! | [`Snapshot`] | One adapter's output from one fetch attempt |
//! | [`MergedAirportWeather`] | Per-airport merge with provenance and staleness |
//!
//! A reading with `value: None` and `is_valid: false` is the only "no data"
//! representation. Adapters never report missing data as zero.

mod field;
mod merged;
mod reading;
mod snapshot;

pub use field::{CloudCover, Field, Unit};
pub use merged::{MergedAirportWeather, MergedReading, Provenance, SourceOutcome, SourceReport};
pub use reading::{Reading, ReadingValue, WindGroup};
pub use snapshot::{Snapshot, SnapshotBuilder};
