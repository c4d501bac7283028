//! Freshness classification for merged readings.
//!
//! | Level | Condition |
//! |-------|-----------|
//! | `fresh` | age ≤ source cadence |
//! | `warning` | cadence < age ≤ source max acceptable age |
//! | `stale` | max acceptable age < age ≤ outage threshold |
//! | `fail_closed` | age > outage threshold, or no valid data at all |
//!
//! The outage threshold is engine configuration with no default. The
//! evaluator only classifies; presentation is up to the consumer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalenessLevel {
    Fresh,
    Warning,
    Stale,
    FailClosed,
}

impl StalenessLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Warning => "warning",
            Self::Stale => "stale",
            Self::FailClosed => "fail_closed",
        }
    }
}

/// Classification plus the threshold that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessReport {
    pub level: StalenessLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,
    pub threshold_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessEvaluator {
    outage_threshold: Duration,
}

impl StalenessEvaluator {
    pub fn new(outage_threshold: Duration) -> Self {
        Self { outage_threshold }
    }

    pub fn outage_threshold(&self) -> Duration {
        self.outage_threshold
    }

    pub fn classify(&self, age: Duration, cadence: Duration, max_acceptable_age: Duration) -> StalenessReport {
        let (level, threshold) = if age > self.outage_threshold {
            (StalenessLevel::FailClosed, self.outage_threshold)
        } else if age <= cadence {
            (StalenessLevel::Fresh, cadence)
        } else if age <= max_acceptable_age {
            (StalenessLevel::Warning, max_acceptable_age)
        } else {
            (StalenessLevel::Stale, self.outage_threshold)
        };

        StalenessReport {
            level,
            age_secs: Some(age.as_secs()),
            threshold_secs: threshold.as_secs(),
        }
    }

    /// Classifies an observation taken at `observed_at` as seen at `now`.
    /// Timestamps in the future count as age zero; a reading without an
    /// observation time fails closed.
    pub fn evaluate(
        &self,
        observed_at: Option<i64>,
        now: i64,
        cadence: Duration,
        max_acceptable_age: Duration,
    ) -> StalenessReport {
        match observed_at {
            Some(observed_at) => {
                let age = u64::try_from(now.saturating_sub(observed_at)).unwrap_or(0);
                self.classify(Duration::from_secs(age), cadence, max_acceptable_age)
            }
            None => self.no_data(),
        }
    }

    pub fn no_data(&self) -> StalenessReport {
        StalenessReport {
            level: StalenessLevel::FailClosed,
            age_secs: None,
            threshold_secs: self.outage_threshold.as_secs(),
        }
    }

    /// Airport-level classification: the report of the oldest surviving
    /// field, or fail-closed when nothing survived.
    pub fn overall<'a>(&self, reports: impl IntoIterator<Item = &'a StalenessReport>) -> StalenessReport {
        reports
            .into_iter()
            .filter(|report| report.age_secs.is_some())
            .max_by_key(|report| (report.age_secs, report.level))
            .copied()
            .unwrap_or_else(|| self.no_data())
    }
}
