//! Per-airport aggregation.
//!
//! ```text
//!  AirportConfig ──▶ resolve adapters ──▶ join_all(fetch per source) ──▶ merge ──▶ staleness
//!                        │                     │
//!                        │ unknown type        ├── breaker gate (per source + endpoint)
//!                        ▼                     ├── timeout (per source)
//!                  unsupported_type            └── station fallback (aviation reports)
//! ```
//!
//! Every source runs concurrently and fails on its own; the aggregation
//! itself always produces a [`MergedAirportWeather`]. Dropping the future
//! returned by [`WeatherAggregator::aggregate`] cancels every in-flight
//! fetch. Fetches that already finished have already been recorded on their
//! breakers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::future::join_all;

use crate::circuit_breaker::{BreakerKey, CircuitBreakerRegistry};
use crate::config::{AirportConfig, EngineConfig, SourceDescriptor};
use crate::data_source::{ParseContext, SourceError, WeatherSource};
use crate::domain::{
    Field, MergedAirportWeather, MergedReading, Provenance, Snapshot, SourceOutcome, SourceReport,
};
use crate::fallback::{fetch_guarded, fetch_with_fallback, FallbackOutcome, FetchEnv};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::merge::{self, SourceContribution};
use crate::registry::AdapterRegistry;
use crate::staleness::StalenessEvaluator;
use crate::ValidationError;

/// Source of "now" for fetch times and staleness ages.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct FixedClock {
    epoch: AtomicI64,
}

impl FixedClock {
    pub fn new(epoch: i64) -> Self {
        Self {
            epoch: AtomicI64::new(epoch),
        }
    }

    pub fn set(&self, epoch: i64) {
        self.epoch.store(epoch, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.epoch.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// Builder for [`WeatherAggregator`].
///
/// Only the engine configuration is required; everything else defaults to
/// production collaborators (all adapters, reqwest transport, a fresh breaker
/// registry, the system clock).
pub struct WeatherAggregatorBuilder {
    engine: EngineConfig,
    registry: Option<AdapterRegistry>,
    http: Option<Arc<dyn HttpClient>>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    clock: Option<Arc<dyn Clock>>,
}

impl WeatherAggregatorBuilder {
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Shares breakers with other aggregators in the process.
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the engine configuration is unusable.
    pub fn build(self) -> Result<WeatherAggregator, ValidationError> {
        self.engine.validate()?;
        let engine = self.engine;
        Ok(WeatherAggregator {
            registry: self.registry.unwrap_or_default(),
            http: self
                .http
                .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new())),
            breakers: self
                .breakers
                .unwrap_or_else(|| Arc::new(CircuitBreakerRegistry::new(engine.circuit_breaker))),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            staleness: StalenessEvaluator::new(Duration::from_secs(engine.outage_threshold_secs)),
            engine,
        })
    }
}

/// Fans out to every configured source of an airport and merges the results.
pub struct WeatherAggregator {
    registry: AdapterRegistry,
    http: Arc<dyn HttpClient>,
    breakers: Arc<CircuitBreakerRegistry>,
    clock: Arc<dyn Clock>,
    staleness: StalenessEvaluator,
    engine: EngineConfig,
}

/// One resolved source after its fetch completed.
struct SourceRun {
    index: usize,
    adapter: Arc<dyn WeatherSource>,
    source_type: String,
    station: Option<String>,
    preferred_fields: Vec<Field>,
    outcome: FallbackOutcome,
    latency_ms: u64,
}

impl WeatherAggregator {
    pub fn builder(engine: EngineConfig) -> WeatherAggregatorBuilder {
        WeatherAggregatorBuilder {
            engine,
            registry: None,
            http: None,
            breakers: None,
            clock: None,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Fetches every source of `airport` concurrently and merges them.
    ///
    /// Per-source failures are reported in [`MergedAirportWeather::sources`]
    /// and never abort the aggregation.
    pub async fn aggregate(&self, airport: &AirportConfig) -> MergedAirportWeather {
        let now = self.clock.now();
        let ctx = ParseContext::new(now).with_policy(self.engine.observation_time);
        tracing::debug!(airport = %airport.id, sources = airport.sources.len(), "aggregating");

        let pending = airport
            .sources
            .iter()
            .enumerate()
            .filter_map(|(index, source)| {
                let adapter = self.registry.get(&source.source_type)?;
                Some(self.run_source(&airport.id, index, adapter, source, ctx))
            });
        let runs = join_all(pending)
            .await
            .into_iter()
            .map(|run| (run.index, run))
            .collect::<BTreeMap<_, _>>();

        let contributions = runs.values().map(contribution).collect::<Vec<_>>();
        let fields = self.merge_fields(&contributions, now);
        let overall = self
            .staleness
            .overall(fields.values().filter_map(|merged| merged.staleness.as_ref()));

        let sources = airport
            .sources
            .iter()
            .enumerate()
            .map(|(index, source)| match runs.get(&index) {
                Some(run) => source_report(run),
                None => unsupported_report(&airport.id, source),
            })
            .collect();

        MergedAirportWeather {
            airport: airport.id.clone(),
            generated_at: now,
            fields,
            raw_report: merge::select_raw_report(&contributions),
            overall,
            sources,
        }
    }

    async fn run_source(
        &self,
        airport: &str,
        index: usize,
        adapter: Arc<dyn WeatherSource>,
        source: &SourceDescriptor,
        ctx: ParseContext,
    ) -> SourceRun {
        let started = Instant::now();
        let env = FetchEnv {
            http: self.http.as_ref(),
            breakers: self.breakers.as_ref(),
            ctx,
            timeout: Duration::from_millis(source.timeout_ms_or(self.engine.default_timeout_ms)),
        };

        let outcome = if adapter.supports_nearby_stations() {
            fetch_with_fallback(adapter.as_ref(), source, env).await
        } else {
            let key = BreakerKey::new(adapter.kind(), adapter.endpoint_identity(source));
            match fetch_guarded(adapter.as_ref(), source, &key, env).await {
                Ok(snapshot) => FallbackOutcome {
                    snapshot,
                    error: None,
                    attempted: Vec::new(),
                },
                Err(error) => FallbackOutcome {
                    snapshot: Snapshot::empty(adapter.kind(), ctx.fetch_time),
                    error: Some(error),
                    attempted: Vec::new(),
                },
            }
        };
        let latency_ms = elapsed_ms(started);

        match &outcome.error {
            Some(error) => tracing::warn!(
                airport,
                source = %adapter.kind(),
                index,
                code = error.code(),
                latency_ms,
                "source failed: {}",
                error.message()
            ),
            None => tracing::debug!(
                airport,
                source = %adapter.kind(),
                index,
                fields = outcome.snapshot.valid_fields().len(),
                latency_ms,
                "source ok"
            ),
        }

        let station = outcome
            .snapshot
            .station
            .clone()
            .or_else(|| source.station().map(str::to_ascii_uppercase));
        let preferred_fields = source
            .preferred
            .clone()
            .unwrap_or_else(|| adapter.preferred_fields().to_vec());
        SourceRun {
            index,
            source_type: adapter.kind().as_str().to_owned(),
            adapter,
            station,
            preferred_fields,
            outcome,
            latency_ms,
        }
    }

    fn merge_fields(
        &self,
        contributions: &[SourceContribution],
        now: i64,
    ) -> BTreeMap<Field, MergedReading> {
        let selections = merge::merge(contributions);
        Field::ALL
            .into_iter()
            .filter_map(|field| {
                let merged = match selections.get(&field) {
                    Some(selection) => {
                        let winner = &contributions[selection.contribution];
                        MergedReading {
                            staleness: Some(self.staleness.evaluate(
                                selection.reading.observation_time,
                                now,
                                winner.update_frequency,
                                winner.max_acceptable_age,
                            )),
                            provenance: Some(Provenance {
                                source: winner.kind,
                                station: winner.station.clone(),
                                source_index: winner.index,
                            }),
                            reading: selection.reading.clone(),
                        }
                    }
                    None => {
                        // Attributed to the first source that declares the field;
                        // fields no configured source declares are left out.
                        let owner = contributions
                            .iter()
                            .find(|contribution| contribution.fields_provided.contains(&field))?;
                        MergedReading {
                            staleness: Some(self.staleness.no_data()),
                            ..MergedReading::invalid(field, owner.kind)
                        }
                    }
                };
                Some((field, merged))
            })
            .collect()
    }
}

fn contribution(run: &SourceRun) -> SourceContribution {
    let adapter = run.adapter.as_ref();
    SourceContribution {
        index: run.index,
        kind: adapter.kind(),
        station: run.station.clone(),
        snapshot: run.outcome.snapshot.clone(),
        fields_provided: adapter.fields_provided(),
        preferred_fields: run.preferred_fields.clone(),
        update_frequency: adapter.typical_update_frequency(),
        max_acceptable_age: adapter.max_acceptable_age(),
    }
}

fn source_report(run: &SourceRun) -> SourceReport {
    let error = run.outcome.error.as_ref();
    SourceReport {
        source_type: run.source_type.clone(),
        station: run.station.clone(),
        outcome: error.map(SourceError::outcome).unwrap_or(SourceOutcome::Ok),
        message: error.map(|error| error.message().to_owned()),
        attempted_stations: run.outcome.attempted.clone(),
        latency_ms: run.latency_ms,
    }
}

fn unsupported_report(airport: &str, source: &SourceDescriptor) -> SourceReport {
    let error = SourceError::unsupported_type(&source.source_type);
    tracing::warn!(airport, source_type = %source.source_type, "{}", error.message());
    SourceReport {
        source_type: source.source_type.clone(),
        station: source.station().map(str::to_owned),
        outcome: error.outcome(),
        message: Some(error.message().to_owned()),
        attempted_stations: Vec::new(),
        latency_ms: 0,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
