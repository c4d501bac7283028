//! Per-field selection across the snapshots of one aggregation.
//!
//! 1. A valid reading from a source that is authoritative for the field wins
//!    outright; among several authoritative sources the most recent wins.
//! 2. Otherwise the most recent valid reading wins.
//! 3. Ties go to configuration order, never to fetch completion order.
//! 4. No valid reading leaves the field invalid.
//!
//! Wind speed and direction are selected together from complete groups only.
//! Gust follows the winning group when it has one and is otherwise selected
//! on its own by the same rules.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::{Field, Reading, Snapshot};
use crate::SourceKind;

/// One source's parsed snapshot plus the adapter facts merging needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContribution {
    /// Position in the airport's configured source list.
    pub index: usize,
    pub kind: SourceKind,
    pub station: Option<String>,
    pub snapshot: Snapshot,
    pub fields_provided: &'static [Field],
    pub preferred_fields: Vec<Field>,
    pub update_frequency: Duration,
    pub max_acceptable_age: Duration,
}

impl SourceContribution {
    fn provides(&self, field: Field) -> bool {
        self.fields_provided.contains(&field)
    }

    fn prefers(&self, field: Field) -> bool {
        self.preferred_fields.contains(&field)
    }

    fn candidate(&self, field: Field) -> Option<&Reading> {
        let reading = self.snapshot.reading(field);
        (self.provides(field) && reading.is_valid).then_some(reading)
    }
}

/// The winning reading for a field and which contribution supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Position in the contribution slice handed to [`merge`].
    pub contribution: usize,
    pub reading: Reading,
}

/// Rank: authoritative first, then most recent, then configuration order.
fn rank(preferred: bool, observed_at: Option<i64>, index: usize) -> (bool, i64, Reverse<usize>) {
    (preferred, observed_at.unwrap_or(i64::MIN), Reverse(index))
}

/// Selects the winning reading for a single field.
pub fn select_field(contributions: &[SourceContribution], field: Field) -> Option<Selection> {
    contributions
        .iter()
        .enumerate()
        .filter_map(|(position, contribution)| {
            contribution
                .candidate(field)
                .map(|reading| (position, contribution, reading))
        })
        .max_by_key(|(_, contribution, reading)| {
            rank(
                contribution.prefers(field),
                reading.observation_time,
                contribution.index,
            )
        })
        .map(|(position, _, reading)| Selection {
            contribution: position,
            reading: reading.clone(),
        })
}

/// Merged wind: speed and direction from one source, gust possibly another.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindSelection {
    pub speed: Option<Selection>,
    pub direction: Option<Selection>,
    pub gust: Option<Selection>,
}

pub fn select_wind(contributions: &[SourceContribution]) -> WindSelection {
    let group_winner = contributions
        .iter()
        .enumerate()
        .filter(|(_, contribution)| {
            contribution.provides(Field::WindSpeed)
                && contribution.provides(Field::WindDirection)
                && contribution.snapshot.wind.is_complete()
        })
        .max_by_key(|(_, contribution)| {
            let preferred = contribution.prefers(Field::WindSpeed)
                || contribution.prefers(Field::WindDirection);
            rank(
                preferred,
                contribution.snapshot.wind.observation_time(),
                contribution.index,
            )
        });

    let Some((position, winner)) = group_winner else {
        return WindSelection {
            gust: select_field(contributions, Field::WindGust),
            ..WindSelection::default()
        };
    };

    let wind = &winner.snapshot.wind;
    let gust = match winner.candidate(Field::WindGust) {
        Some(gust) => Some(Selection {
            contribution: position,
            reading: gust.clone(),
        }),
        None => select_field(contributions, Field::WindGust),
    };

    WindSelection {
        speed: Some(Selection {
            contribution: position,
            reading: wind.speed.clone(),
        }),
        direction: Some(Selection {
            contribution: position,
            reading: wind.direction.clone(),
        }),
        gust,
    }
}

/// Selects every canonical field. Fields with no valid reading are absent.
pub fn merge(contributions: &[SourceContribution]) -> BTreeMap<Field, Selection> {
    let mut selections = Field::SCALAR
        .into_iter()
        .filter_map(|field| select_field(contributions, field).map(|selection| (field, selection)))
        .collect::<BTreeMap<_, _>>();

    let wind = select_wind(contributions);
    for (field, selection) in [
        (Field::WindSpeed, wind.speed),
        (Field::WindDirection, wind.direction),
        (Field::WindGust, wind.gust),
    ] {
        if let Some(selection) = selection {
            selections.insert(field, selection);
        }
    }
    selections
}

/// Raw report for the merged result: the first aviation report in
/// configuration order, otherwise the first raw report of any kind.
pub fn select_raw_report(contributions: &[SourceContribution]) -> Option<String> {
    let mut ordered = contributions.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|contribution| (!contribution.kind.is_aviation_report(), contribution.index));
    ordered
        .into_iter()
        .find_map(|contribution| contribution.snapshot.raw_report.clone())
}
