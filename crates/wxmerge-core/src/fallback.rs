//! Breaker-gated fetches and the station fallback chain.
//!
//! Sources that accept `nearby_stations` try the primary station first and
//! then each alternate in configured order. Every station has its own
//! breaker, so one dead station never blocks its neighbours.

use std::time::Duration;

use crate::circuit_breaker::{BreakerKey, CircuitBreakerRegistry};
use crate::config::SourceDescriptor;
use crate::data_source::{ParseContext, SourceError, WeatherSource};
use crate::domain::Snapshot;
use crate::http_client::HttpClient;

/// Shared inputs of one fetch attempt.
#[derive(Clone, Copy)]
pub struct FetchEnv<'a> {
    pub http: &'a dyn HttpClient,
    pub breakers: &'a CircuitBreakerRegistry,
    pub ctx: ParseContext,
    pub timeout: Duration,
}

/// Result of a fallback chain run.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    /// First valid snapshot, tagged with its station, or an empty snapshot.
    pub snapshot: Snapshot,
    /// Last failure when no station produced data.
    pub error: Option<SourceError>,
    /// Stations tried, in order.
    pub attempted: Vec<String>,
}

impl FallbackOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One fetch under `key`'s breaker, bounded by the attempt timeout.
///
/// Configuration errors and refusals by an open breaker leave the breaker
/// untouched. A payload that parses to no valid reading counts as a failure.
pub async fn fetch_guarded(
    adapter: &dyn WeatherSource,
    source: &SourceDescriptor,
    key: &BreakerKey,
    env: FetchEnv<'_>,
) -> Result<Snapshot, SourceError> {
    if !env.breakers.allow(key) {
        return Err(SourceError::circuit_open(key));
    }

    tracing::debug!(breaker = %key, timeout_ms = env.timeout.as_millis() as u64, "fetching");
    let result = match tokio::time::timeout(
        env.timeout,
        adapter.fetch(env.http, source, env.ctx, env.timeout),
    )
    .await
    {
        Ok(Ok(snapshot)) if snapshot.is_valid => Ok(snapshot),
        Ok(Ok(_)) => Err(SourceError::parse(format!(
            "{} payload contained no valid readings",
            adapter.kind()
        ))),
        Ok(Err(error)) => Err(error),
        Err(_) => Err(SourceError::timeout(env.timeout)),
    };

    match &result {
        Ok(_) => env.breakers.record_success(key),
        Err(error) if error.is_breaker_failure() => env.breakers.record_failure(key),
        Err(_) => {}
    }
    result
}

/// Primary station followed by the alternates, without blanks or repeats.
pub fn station_chain(source: &SourceDescriptor) -> Vec<String> {
    let mut chain: Vec<String> = Vec::with_capacity(source.nearby_stations.len() + 1);
    let candidates = source
        .station()
        .into_iter()
        .chain(source.nearby_stations.iter().map(|station| station.trim()));
    for station in candidates.filter(|station| !station.is_empty()) {
        let station = station.to_ascii_uppercase();
        if !chain.contains(&station) {
            chain.push(station);
        }
    }
    chain
}

/// Runs the fallback chain for a source that supports nearby stations.
pub async fn fetch_with_fallback(
    adapter: &dyn WeatherSource,
    source: &SourceDescriptor,
    env: FetchEnv<'_>,
) -> FallbackOutcome {
    let chain = station_chain(source);
    if chain.is_empty() {
        let key = BreakerKey::new(adapter.kind(), adapter.endpoint_identity(source));
        return match fetch_guarded(adapter, source, &key, env).await {
            Ok(snapshot) => FallbackOutcome {
                snapshot,
                error: None,
                attempted: Vec::new(),
            },
            Err(error) => FallbackOutcome {
                snapshot: Snapshot::empty(adapter.kind(), env.ctx.fetch_time),
                error: Some(error),
                attempted: Vec::new(),
            },
        };
    }

    let mut attempted = Vec::with_capacity(chain.len());
    let mut last_error = None;
    for station in chain {
        attempted.push(station.clone());
        let bound = source.for_station(&station);
        let key = BreakerKey::new(adapter.kind(), adapter.endpoint_identity(&bound));
        match fetch_guarded(adapter, &bound, &key, env).await {
            Ok(snapshot) => {
                if attempted.len() > 1 {
                    tracing::info!(
                        source = %adapter.kind(),
                        station = %station,
                        failed_attempts = attempted.len() - 1,
                        "fallback station supplied data"
                    );
                }
                return FallbackOutcome {
                    snapshot: snapshot.with_station(station),
                    error: None,
                    attempted,
                };
            }
            Err(error) => {
                tracing::debug!(source = %adapter.kind(), station = %station, error = %error, "station attempt failed");
                last_error = Some(error);
            }
        }
    }

    FallbackOutcome {
        snapshot: Snapshot::empty(adapter.kind(), env.ctx.fetch_time),
        error: last_error,
        attempted,
    }
}
