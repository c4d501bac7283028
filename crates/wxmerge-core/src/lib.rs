//! # wxmerge Core
//!
//! Weather normalization and multi-source aggregation for airports.
//!
//! ## Overview
//!
//! Every configured upstream (consumer stations, METAR services, national
//! met service feeds, peer instances) is fetched concurrently, parsed into a
//! canonical [`Snapshot`] with fixed units, and merged field by field into a
//! single [`MergedAirportWeather`] with provenance and staleness.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | One parser per upstream format |
//! | [`aggregator`] | Concurrent fan-out, merge, and staleness for one airport |
//! | [`circuit_breaker`] | Per-endpoint fault isolation |
//! | [`config`] | Airport and engine configuration |
//! | [`data_source`] | Adapter trait, capabilities, and source errors |
//! | [`domain`] | Fields, readings, snapshots, merged results |
//! | [`error`] | Configuration and validation errors |
//! | [`fallback`] | Breaker-gated fetches and the station fallback chain |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`merge`] | Per-field selection rules |
//! | [`obs_time`] | Observation time resolution |
//! | [`parsing`] | Sentinel-aware value parsing |
//! | [`registry`] | Adapter lookup by source type |
//! | [`source`] | Source identifiers |
//! | [`staleness`] | Freshness classification |
//! | [`units`] | Fixed unit conversions |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wxmerge_core::{WeatherAggregator, WxmergeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WxmergeConfig::load_from_path("airports.json")?;
//!     let aggregator = WeatherAggregator::builder(config.engine).build()?;
//!
//!     let merged = aggregator.aggregate(config.airport("KSPB")?).await;
//!     println!("{}", serde_json::to_string_pretty(&merged)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Aggregator    │────▶│ Circuit Breakers │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Weather Source  │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest/static) │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Merge/Staleness │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Only configuration problems are fatal, and they surface before an
//! aggregation starts as [`ConfigError`]. Everything that goes wrong with a
//! single source becomes a [`SourceError`] and ends up in that source's
//! [`SourceReport`]:
//!
//! ```rust
//! use wxmerge_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::Configuration => "fix the airport configuration",
//!         SourceErrorKind::CircuitOpen => "endpoint is cooling down",
//!         _ => "upstream problem, other sources still contribute",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - Credentials can be indirected through the environment (`env:NAME`)
//! - Credentials never appear in logs or source reports

pub mod adapters;
pub mod aggregator;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fallback;
pub mod http_client;
pub mod merge;
pub mod obs_time;
pub mod parsing;
pub mod registry;
pub mod source;
pub mod staleness;
pub mod units;

// Adapter implementations
pub use adapters::{
    AmbientAdapter, EcowittAdapter, FederatedAdapter, MetarAdapter, MetarTextAdapter, NwsAdapter,
    OpenMeteoAdapter, PwsWeatherAdapter, SwobAdapter, SynopticDataAdapter, TempestAdapter,
    WeatherLinkAdapter,
};

// Aggregation
pub use aggregator::{Clock, FixedClock, SystemClock, WeatherAggregator, WeatherAggregatorBuilder};
pub use fallback::{fetch_with_fallback, FallbackOutcome, FetchEnv};
pub use registry::AdapterRegistry;

// Circuit breaker
pub use circuit_breaker::{
    BreakerKey, BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry,
    CircuitState,
};

// Configuration
pub use config::{AirportConfig, EngineConfig, SourceDescriptor, WxmergeConfig};

// Adapter trait and types
pub use data_source::{
    ParseContext, SourceCapabilities, SourceError, SourceErrorKind, WeatherSource,
};

// Domain models
pub use domain::{
    CloudCover, Field, MergedAirportWeather, MergedReading, Provenance, Reading, ReadingValue,
    Snapshot, SnapshotBuilder, SourceOutcome, SourceReport, Unit, WindGroup,
};

// Error types
pub use error::{ConfigError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
    StaticHttpClient,
};

pub use obs_time::ObservationTimePolicy;
pub use source::SourceKind;
pub use staleness::{StalenessEvaluator, StalenessLevel, StalenessReport};
