//! Fault isolation across sources: circuit breakers, timeouts, station
//! fallback, and cancellation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wxmerge_core::http_client::HttpFuture;
use wxmerge_core::{
    AirportConfig, BreakerKey, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    EngineConfig, Field, FixedClock, HttpClient, HttpError, HttpRequest, HttpResponse,
    SourceDescriptor, SourceKind, SourceOutcome, StaticHttpClient, WeatherAggregator,
};

/// 2024-01-15T13:00:00Z.
const NOW: i64 = 1_705_323_600;

fn tempest_body(timestamp: i64, temperature: f64) -> String {
    format!(
        r#"{{"obs":[{{"timestamp":{timestamp},"air_temperature":{temperature},"relative_humidity":70,
            "sea_level_pressure":1012.0,"wind_avg":2.5,"wind_direction":220,"wind_gust":4.0}}]}}"#
    )
}

fn tempest(station: &str) -> SourceDescriptor {
    SourceDescriptor::new("tempest")
        .with_station(station)
        .with_setting("token", "t")
}

fn breakers(failure_threshold: u32, open_timeout_ms: u64) -> Arc<CircuitBreakerRegistry> {
    Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
        failure_threshold,
        open_timeout_ms,
        max_open_timeout_ms: Some(open_timeout_ms * 4),
    }))
}

fn aggregator(http: Arc<dyn HttpClient>, breakers: Arc<CircuitBreakerRegistry>) -> WeatherAggregator {
    WeatherAggregator::builder(EngineConfig::new(3 * 3_600))
        .with_http_client(http)
        .with_breakers(breakers)
        .with_clock(Arc::new(FixedClock::new(NOW)))
        .build()
        .expect("valid engine config")
}

/// Replays a fixed sequence of outcomes, one per request.
struct ScriptedHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    calls: Mutex<usize>,
}

impl ScriptedHttpClient {
    fn new(script: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().expect("lock")
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        *self.calls.lock().expect("lock") += 1;
        let next = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("script exhausted")));
        Box::pin(async move { next })
    }
}

// =============================================================================
// Circuit breaker
// =============================================================================

#[tokio::test]
async fn failing_station_trips_its_breaker_without_touching_others() {
    // Given: one dead station and one healthy station, threshold two
    let http = Arc::new(
        StaticHttpClient::new()
            .with_error("station/1111", HttpError::new("connection refused"))
            .with_json("station/2222", tempest_body(NOW - 30, 8.0)),
    );
    let breakers = breakers(2, 60_000);
    let engine = aggregator(http.clone(), breakers.clone());
    let airport = AirportConfig::new("KSPB", vec![tempest("1111"), tempest("2222")]);

    // When
    let first = engine.aggregate(&airport).await;
    let second = engine.aggregate(&airport).await;
    let third = engine.aggregate(&airport).await;

    // Then: the third attempt never reaches the network
    assert_eq!(first.sources[0].outcome, SourceOutcome::TransportError);
    assert_eq!(second.sources[0].outcome, SourceOutcome::TransportError);
    assert_eq!(third.sources[0].outcome, SourceOutcome::CircuitOpen);
    assert_eq!(http.request_count("station/1111"), 2);

    // And: the healthy station is unaffected
    assert!(third.sources[1].outcome == SourceOutcome::Ok);
    assert_eq!(http.request_count("station/2222"), 3);
    assert_eq!(third.value(Field::Temperature), Some(8.0));

    let status = breakers
        .status(&BreakerKey::new(SourceKind::Tempest, "1111"))
        .expect("breaker created on first failure");
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.consecutive_failures, 2);
    assert!(breakers
        .status(&BreakerKey::new(SourceKind::Tempest, "2222"))
        .map_or(true, |status| status.state == CircuitState::Closed));
}

#[tokio::test]
async fn success_resets_the_failure_count() {
    // Given: two failures, a success, then two more failures with threshold three
    let http = Arc::new(ScriptedHttpClient::new([
        Err(HttpError::new("reset by peer")),
        Err(HttpError::new("reset by peer")),
        Ok(HttpResponse::ok(tempest_body(NOW - 30, 3.0))),
        Err(HttpError::new("reset by peer")),
        Err(HttpError::new("reset by peer")),
    ]));
    let breakers = breakers(3, 60_000);
    let engine = aggregator(http.clone(), breakers.clone());
    let airport = AirportConfig::new("KSPB", vec![tempest("1111")]);

    // When
    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(engine.aggregate(&airport).await.sources[0].outcome);
    }

    // Then: every attempt reached the network and the breaker stayed closed
    assert_eq!(outcomes[2], SourceOutcome::Ok);
    assert!(!outcomes.contains(&SourceOutcome::CircuitOpen));
    assert_eq!(http.calls(), 5);
    let status = breakers
        .status(&BreakerKey::new(SourceKind::Tempest, "1111"))
        .expect("breaker exists");
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.consecutive_failures, 2);
}

#[tokio::test]
async fn half_open_breaker_admits_a_single_trial() {
    // Given: an open breaker whose cooldown has elapsed
    let breakers = breakers(1, 20);
    let airport = AirportConfig::new("KSPB", vec![tempest("1111")]);
    let failing = aggregator(
        Arc::new(StaticHttpClient::new().with_error("station/1111", HttpError::new("down"))),
        breakers.clone(),
    );
    assert_eq!(
        failing.aggregate(&airport).await.sources[0].outcome,
        SourceOutcome::TransportError
    );
    tokio::time::sleep(Duration::from_millis(40)).await;

    // When: two aggregations race while the trial is still in flight
    let recovering = Arc::new(StaticHttpClient::new().with_delayed(
        "station/1111",
        HttpResponse::ok(tempest_body(NOW - 30, 2.0)),
        Duration::from_millis(50),
    ));
    let engine = aggregator(recovering.clone(), breakers.clone());
    let (a, b) = tokio::join!(engine.aggregate(&airport), engine.aggregate(&airport));

    // Then: exactly one request went out and it closed the breaker
    let mut outcomes = [a.sources[0].outcome, b.sources[0].outcome];
    outcomes.sort_by_key(|outcome| *outcome != SourceOutcome::Ok);
    assert_eq!(outcomes, [SourceOutcome::Ok, SourceOutcome::CircuitOpen]);
    assert_eq!(recovering.request_count("station/1111"), 1);
    let status = breakers
        .status(&BreakerKey::new(SourceKind::Tempest, "1111"))
        .expect("breaker exists");
    assert_eq!(status.state, CircuitState::Closed);
}

#[tokio::test]
async fn configuration_errors_never_trip_the_breaker() {
    // Given: a source missing its token and a breaker that opens on one failure
    let http = Arc::new(StaticHttpClient::new());
    let breakers = breakers(1, 60_000);
    let engine = aggregator(http.clone(), breakers.clone());
    let airport = AirportConfig::new(
        "KSPB",
        vec![SourceDescriptor::new("tempest").with_station("1111")],
    );

    // When
    let first = engine.aggregate(&airport).await;
    let second = engine.aggregate(&airport).await;

    // Then
    assert_eq!(first.sources[0].outcome, SourceOutcome::ConfigurationError);
    assert_eq!(second.sources[0].outcome, SourceOutcome::ConfigurationError);
    assert!(second.sources[0]
        .message
        .as_deref()
        .is_some_and(|message| message.contains("token")));
    assert!(http.requests().is_empty());
    assert!(breakers.statuses().is_empty());
}

// =============================================================================
// Timeouts and cancellation
// =============================================================================

#[tokio::test]
async fn slow_source_times_out_while_others_complete() {
    // Given: one station that answers after two seconds with a 50 ms budget
    let http = Arc::new(
        StaticHttpClient::new()
            .with_delayed(
                "station/1111",
                HttpResponse::ok(tempest_body(NOW - 10, 1.0)),
                Duration::from_secs(2),
            )
            .with_json("station/2222", tempest_body(NOW - 30, 9.0)),
    );
    let breakers = breakers(3, 60_000);
    let engine = aggregator(http, breakers.clone());
    let airport = AirportConfig::new(
        "KSPB",
        vec![tempest("1111").with_timeout_ms(50), tempest("2222")],
    );

    // When
    let started = std::time::Instant::now();
    let merged = engine.aggregate(&airport).await;

    // Then
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(merged.sources[0].outcome, SourceOutcome::Timeout);
    assert_eq!(merged.sources[1].outcome, SourceOutcome::Ok);
    assert_eq!(merged.value(Field::Temperature), Some(9.0));
    let status = breakers
        .status(&BreakerKey::new(SourceKind::Tempest, "1111"))
        .expect("timeouts count as failures");
    assert_eq!(status.consecutive_failures, 1);
}

#[tokio::test]
async fn dropping_an_aggregation_leaves_breakers_untouched() {
    // Given: a slow upstream
    let http = Arc::new(StaticHttpClient::new().with_delayed(
        "station/1111",
        HttpResponse::ok(tempest_body(NOW - 30, 4.0)),
        Duration::from_millis(200),
    ));
    let breakers = breakers(1, 60_000);
    let engine = aggregator(http.clone(), breakers.clone());
    let airport = AirportConfig::new("KSPB", vec![tempest("1111")]);

    // When: the caller gives up before the fetch completes
    let cancelled = tokio::time::timeout(Duration::from_millis(20), engine.aggregate(&airport)).await;

    // Then: nothing was recorded and the next aggregation proceeds normally
    assert!(cancelled.is_err());
    assert!(breakers.statuses().is_empty());
    let merged = engine.aggregate(&airport).await;
    assert_eq!(merged.sources[0].outcome, SourceOutcome::Ok);
    assert_eq!(http.request_count("station/1111"), 2);
}

// =============================================================================
// Station fallback
// =============================================================================

#[tokio::test]
async fn aviation_source_falls_back_to_a_nearby_station() {
    // Given: the primary METAR station is down, the first alternate reports
    let http = Arc::new(
        StaticHttpClient::new()
            .with_error("ids=KSPB", HttpError::new("service unavailable"))
            .with_json(
                "ids=KVUO",
                r#"[{"icaoId":"KVUO","obsTime":1705322700,"visib":4,"temp":7,
                    "rawOb":"KVUO 151245Z 24006KT 4SM BR BKN009 07/05 A3002"}]"#,
            ),
    );
    let airport = AirportConfig::new(
        "KSPB",
        vec![SourceDescriptor::new("metar")
            .with_station("KSPB")
            .with_nearby(["KVUO", "KPDX"])],
    );

    // When
    let merged = aggregator(http.clone(), breakers(3, 60_000))
        .aggregate(&airport)
        .await;

    // Then
    let report = merged.source_report("metar").expect("metar report");
    assert_eq!(report.outcome, SourceOutcome::Ok);
    assert_eq!(report.station.as_deref(), Some("KVUO"));
    assert_eq!(report.attempted_stations, vec!["KSPB", "KVUO"]);
    assert_eq!(http.request_count("ids=KPDX"), 0);

    let visibility = merged.field(Field::Visibility).expect("visibility present");
    assert_eq!(visibility.reading.as_f64(), Some(4.0));
    assert_eq!(
        visibility.provenance.as_ref().and_then(|p| p.station.as_deref()),
        Some("KVUO")
    );
    assert!(merged.raw_report.as_deref().is_some_and(|raw| raw.starts_with("KVUO")));
}

#[tokio::test]
async fn exhausted_fallback_chain_reports_the_last_error() {
    // Given: every station in the chain fails
    let http = Arc::new(StaticHttpClient::new().with_error("aviationweather.gov", HttpError::new("down")));
    let airport = AirportConfig::new(
        "KSPB",
        vec![SourceDescriptor::new("metar")
            .with_station("KSPB")
            .with_nearby(["KVUO"])],
    );

    // When
    let merged = aggregator(http, breakers(3, 60_000)).aggregate(&airport).await;

    // Then
    let report = merged.source_report("metar").expect("metar report");
    assert_eq!(report.outcome, SourceOutcome::TransportError);
    assert_eq!(report.attempted_stations, vec!["KSPB", "KVUO"]);
    assert!(merged.fields.values().all(|field| !field.is_valid()));
    assert_eq!(merged.overall.level, wxmerge_core::StalenessLevel::FailClosed);
}
