//! Weather source trait, capability descriptors, and the source error type.
//!
//! Every upstream format is implemented once as a [`WeatherSource`]. The
//! adapter owns its request shape and its parser; the aggregator owns
//! timeouts, circuit breaking, fallback, and merging.
//!
//! # Contract
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`kind`](WeatherSource::kind) | Source identifier |
//! | [`capabilities`](WeatherSource::capabilities) | Static descriptor (fields, cadence, authority) |
//! | [`build_request`](WeatherSource::build_request) | Outbound request, or a configuration error without any network call |
//! | [`try_parse`](WeatherSource::try_parse) | Payload to [`Snapshot`], reporting why a payload was unusable |
//! | [`parse`](WeatherSource::parse) | Never fails; any structural problem yields [`Snapshot::empty`] |
//! | [`fetch`](WeatherSource::fetch) | Request, transport, status check, and parse in one future |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use crate::config::SourceDescriptor;
use crate::domain::{Field, Snapshot, SourceOutcome};
use crate::http_client::{HttpClient, HttpError, HttpRequest};
use crate::obs_time::{ObservationTimePolicy, TimeCandidates};
use crate::SourceKind;

/// Static capability descriptor for one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceCapabilities {
    pub kind: SourceKind,
    pub fields: &'static [Field],
    pub update_frequency_secs: u64,
    /// `max_acceptable_age = update_frequency × max_age_multiple`.
    pub max_age_multiple: u64,
    pub preferred_fields: &'static [Field],
    pub nearby_stations: bool,
    pub auth: &'static str,
    pub wire_format: &'static str,
}

impl SourceCapabilities {
    pub const fn max_acceptable_age_secs(&self) -> u64 {
        self.update_frequency_secs * self.max_age_multiple
    }

    pub fn provides(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Required credential or station missing. No network call was made.
    Configuration,
    Transport,
    Timeout,
    Parse,
    /// Well-formed but unusable: wrong station identity or too old.
    Rejected,
    CircuitOpen,
    UnsupportedType,
}

/// Structured per-source error. Never crosses the aggregator boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Configuration, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transport, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            SourceErrorKind::Timeout,
            format!("request timed out after {} ms", after.as_millis()),
        )
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Parse, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Rejected, message)
    }

    pub fn circuit_open(endpoint: impl Display) -> Self {
        Self::new(
            SourceErrorKind::CircuitOpen,
            format!("circuit breaker is open for '{endpoint}'"),
        )
    }

    pub fn unsupported_type(source_type: &str) -> Self {
        Self::new(
            SourceErrorKind::UnsupportedType,
            format!("source type '{source_type}' is not supported"),
        )
    }

    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Configuration => "source.configuration",
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Parse => "source.parse",
            SourceErrorKind::Rejected => "source.rejected",
            SourceErrorKind::CircuitOpen => "source.circuit_open",
            SourceErrorKind::UnsupportedType => "source.unsupported_type",
        }
    }

    /// Whether this error counts towards opening the endpoint's breaker.
    pub const fn is_breaker_failure(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Transport
                | SourceErrorKind::Timeout
                | SourceErrorKind::Parse
                | SourceErrorKind::Rejected
        )
    }

    pub const fn outcome(&self) -> SourceOutcome {
        match self.kind {
            SourceErrorKind::Configuration => SourceOutcome::ConfigurationError,
            SourceErrorKind::Transport => SourceOutcome::TransportError,
            SourceErrorKind::Timeout => SourceOutcome::Timeout,
            SourceErrorKind::Parse => SourceOutcome::ParseError,
            SourceErrorKind::Rejected => SourceOutcome::Rejected,
            SourceErrorKind::CircuitOpen => SourceOutcome::CircuitOpen,
            SourceErrorKind::UnsupportedType => SourceOutcome::UnsupportedType,
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<HttpError> for SourceError {
    fn from(error: HttpError) -> Self {
        if error.is_timeout() {
            Self::new(SourceErrorKind::Timeout, error.message())
        } else {
            Self::transport(error.message())
        }
    }
}

/// Per-fetch parse inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseContext {
    pub fetch_time: i64,
    pub policy: ObservationTimePolicy,
}

impl ParseContext {
    pub fn new(fetch_time: i64) -> Self {
        Self {
            fetch_time,
            policy: ObservationTimePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ObservationTimePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolves an observation time, falling back to the fetch time.
    pub fn observed_at(&self, candidates: TimeCandidates<'_>) -> i64 {
        self.policy.resolve(candidates, self.fetch_time)
    }

    /// Resolves an observation time without the fetch-time fallback.
    pub fn observed_at_strict(&self, candidates: TimeCandidates<'_>) -> Option<i64> {
        self.policy.resolve_strict(candidates, self.fetch_time)
    }

    /// Resolves the observation time of a whole payload. A payload that
    /// carries timestamps, none of them plausible, is rejected; one that
    /// carries none at all is stamped with the fetch time.
    pub fn observation_time(
        &self,
        kind: SourceKind,
        candidates: TimeCandidates<'_>,
    ) -> Result<i64, SourceError> {
        if candidates.is_empty() {
            return Ok(self.fetch_time);
        }
        self.observed_at_strict(candidates).ok_or_else(|| {
            SourceError::rejected(format!(
                "{kind} observation time is outside the accepted window"
            ))
        })
    }
}

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Snapshot, SourceError>> + Send + 'a>>;

/// Weather source adapter contract.
///
/// Implementations must be `Send + Sync`; one instance serves every airport
/// and every concurrent aggregation.
pub trait WeatherSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn capabilities(&self) -> SourceCapabilities;

    fn fields_provided(&self) -> &'static [Field] {
        self.capabilities().fields
    }

    fn typical_update_frequency(&self) -> Duration {
        Duration::from_secs(self.capabilities().update_frequency_secs)
    }

    fn max_acceptable_age(&self) -> Duration {
        Duration::from_secs(self.capabilities().max_acceptable_age_secs())
    }

    fn preferred_fields(&self) -> &'static [Field] {
        self.capabilities().preferred_fields
    }

    /// Sources that accept `nearby_stations` go through the fallback chain.
    fn supports_nearby_stations(&self) -> bool {
        self.capabilities().nearby_stations
    }

    /// Endpoint component of this source's circuit breaker key.
    fn endpoint_identity(&self, source: &SourceDescriptor) -> String {
        source
            .station()
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| String::from("default"))
    }

    /// Builds the outbound request.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceErrorKind::Configuration`] error when a required
    /// credential or identifier is absent.
    fn build_request(&self, source: &SourceDescriptor, now: i64) -> Result<HttpRequest, SourceError>;

    /// Parses a payload, reporting why it was unusable.
    ///
    /// # Errors
    ///
    /// [`SourceErrorKind::Parse`] for structural problems and
    /// [`SourceErrorKind::Rejected`] for well-formed payloads from the wrong
    /// station.
    fn try_parse(
        &self,
        body: &str,
        source: &SourceDescriptor,
        ctx: &ParseContext,
    ) -> Result<Snapshot, SourceError>;

    fn parse(&self, body: &str, source: &SourceDescriptor, ctx: &ParseContext) -> Snapshot {
        self.try_parse(body, source, ctx)
            .unwrap_or_else(|_| Snapshot::empty(self.kind(), ctx.fetch_time))
    }

    /// Builds the request, executes it, checks the status, and parses.
    fn fetch<'a>(
        &'a self,
        http: &'a dyn HttpClient,
        source: &'a SourceDescriptor,
        ctx: ParseContext,
        timeout: Duration,
    ) -> FetchFuture<'a> {
        Box::pin(async move {
            let request = self
                .build_request(source, ctx.fetch_time)?
                .with_timeout_ms(timeout.as_millis() as u64);
            let response = http.execute(request).await?;
            if !response.is_success() {
                return Err(SourceError::transport(format!(
                    "{} returned status {}",
                    self.kind(),
                    response.status
                )));
            }
            self.try_parse(&response.body, source, &ctx)
        })
    }
}

/// Rejects a payload whose station identity differs from the configured one.
pub(crate) fn check_station(
    kind: SourceKind,
    expected: Option<&str>,
    reported: Option<&str>,
) -> Result<(), SourceError> {
    match (expected, reported) {
        (Some(expected), Some(reported)) if !expected.eq_ignore_ascii_case(reported.trim()) => {
            Err(SourceError::rejected(format!(
                "{kind} payload is for station '{reported}', expected '{expected}'"
            )))
        }
        _ => Ok(()),
    }
}

/// Deserializes a JSON body, mapping failures to a parse error.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    kind: SourceKind,
    body: &str,
) -> Result<T, SourceError> {
    serde_json::from_str(body)
        .map_err(|error| SourceError::parse(format!("failed to parse {kind} response: {error}")))
}
