//! Per-endpoint fault isolation.
//!
//! ```text
//!            N consecutive failures          cooldown elapsed
//!  Closed ───────────────────────────▶ Open ─────────────────▶ HalfOpen (one trial)
//!    ▲                                  ▲                         │
//!    │            trial fails, cooldown │ doubled if opted in     │
//!    │                                  └─────────────────────────┤
//!    └────────────────────────── trial succeeds ──────────────────┘
//! ```
//!
//! Any success resets the failure counter and the cooldown. Breakers live in
//! a [`CircuitBreakerRegistry`] keyed by `(source, endpoint)` and are created
//! the first time an endpoint fails.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::SourceKind;

/// Runtime circuit state for upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout_ms: u64,
    /// Upper bound for the cooldown as it doubles on repeated re-opening.
    /// Unset means no backoff: a failed trial request restarts the same cooldown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_open_timeout_ms: Option<u64>,
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn max_open_timeout(&self) -> Duration {
        let ceiling = self.max_open_timeout_ms.unwrap_or(self.open_timeout_ms);
        Duration::from_millis(ceiling.max(self.open_timeout_ms))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout_ms: 30_000,
            max_open_timeout_ms: None,
        }
    }
}

/// Observability view of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_epoch: Option<i64>,
    pub cooldown_ms: u64,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    cooldown: Duration,
    last_failure_epoch: Option<i64>,
}

/// Thread-safe circuit breaker for one upstream endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::named("unnamed", config)
    }

    pub fn named(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                cooldown: config.open_timeout(),
                last_failure_epoch: None,
            }),
        }
    }

    /// Decides whether a call may proceed. After the cooldown the first
    /// caller becomes the half-open trial; everyone else is refused until
    /// that trial is recorded.
    pub fn allow_request(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        if inner.state == CircuitState::Closed {
            return true;
        }

        // In half-open, `opened_at` marks when the trial was admitted. A trial
        // that never reports back (cancelled fetch) is replaced after a
        // further cooldown.
        let trial_due = inner
            .opened_at
            .map(|opened_at| opened_at.elapsed() >= inner.cooldown)
            .unwrap_or(true);
        if !trial_due {
            return false;
        }
        if inner.state == CircuitState::Open {
            tracing::info!(breaker = %self.name, "circuit half-open, admitting trial");
        }
        inner.state = CircuitState::HalfOpen;
        inner.opened_at = Some(Instant::now());
        true
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        if inner.state != CircuitState::Closed {
            tracing::info!(breaker = %self.name, from = ?inner.state, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.cooldown = self.config.open_timeout();
    }

    pub fn record_failure(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_epoch = Some(epoch_now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.cooldown = (inner.cooldown * 2).min(self.config.max_open_timeout());
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::info!(
                    breaker = %self.name,
                    cooldown_ms = inner.cooldown.as_millis() as u64,
                    "trial failed, circuit re-opened"
                );
            }
            CircuitState::Closed
                if inner.consecutive_failures >= self.config.failure_threshold =>
            {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::info!(
                    breaker = %self.name,
                    failures = inner.consecutive_failures,
                    cooldown_ms = inner.cooldown.as_millis() as u64,
                    "circuit opened"
                );
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.consecutive_failures
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        BreakerStatus {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_epoch: inner.last_failure_epoch,
            cooldown_ms: inner.cooldown.as_millis() as u64,
        }
    }
}

fn epoch_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// Breaker identity: source type plus endpoint (station or device id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BreakerKey {
    pub source: SourceKind,
    pub endpoint: String,
}

impl BreakerKey {
    pub fn new(source: SourceKind, endpoint: impl Into<String>) -> Self {
        Self {
            source,
            endpoint: endpoint.into(),
        }
    }
}

impl Display for BreakerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source, self.endpoint)
    }
}

/// Process-wide breaker store shared by every concurrent aggregation.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<BreakerKey, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    fn get(&self, key: &BreakerKey) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .lock()
            .expect("breaker registry lock is not poisoned")
            .get(key)
            .cloned()
    }

    fn get_or_create(&self, key: &BreakerKey) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .expect("breaker registry lock is not poisoned");
        Arc::clone(
            breakers
                .entry(key.clone())
                .or_insert_with(|| Arc::new(CircuitBreaker::named(key.to_string(), self.config))),
        )
    }

    /// Endpoints that never failed have no breaker and are always allowed.
    pub fn allow(&self, key: &BreakerKey) -> bool {
        self.get(key)
            .map(|breaker| breaker.allow_request())
            .unwrap_or(true)
    }

    pub fn record_success(&self, key: &BreakerKey) {
        if let Some(breaker) = self.get(key) {
            breaker.record_success();
        }
    }

    pub fn record_failure(&self, key: &BreakerKey) {
        self.get_or_create(key).record_failure();
    }

    pub fn status(&self, key: &BreakerKey) -> Option<BreakerStatus> {
        self.get(key).map(|breaker| breaker.status())
    }

    pub fn statuses(&self) -> BTreeMap<BreakerKey, BreakerStatus> {
        self.breakers
            .lock()
            .expect("breaker registry lock is not poisoned")
            .iter()
            .map(|(key, breaker)| (key.clone(), breaker.status()))
            .collect()
    }
}
