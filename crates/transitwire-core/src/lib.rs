//! # Transitwire Core
//!
//! Typed access layer for legacy transit REST endpoints.
//!
//! ## Overview
//!
//! Every call goes through one pipeline that turns a catalog entry and a parameter
//! object into fully validated JSON or a classified [`FetchError`]:
//!
//! - **Environment detection** picks the transport for the current runtime
//! - **Structural contracts** check parameters before and payloads after the call
//! - **URL building** fills `{placeholders}` and appends the access code last
//! - **Transports** reach the remote directly or through callback-wrapped scripts
//! - **Date normalization** rewrites `/Date(ms)/` and ISO strings to RFC 3339 UTC
//! - **Flush monitoring** marks a domain's cached results stale when it changes
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Shared response cache with per-domain flush state |
//! | [`cache_policy`] | Freshness classes and their timings |
//! | [`cached`] | Caller-side cache and retry layer |
//! | [`catalog`] | Endpoint descriptors loaded from JSON |
//! | [`config`] | Access code, base URL and user agent |
//! | [`contract`] | Input and output validation |
//! | [`date_codec`] | Legacy and ISO date decoding |
//! | [`environment`] | Browser / server / test detection |
//! | [`error`] | Error types and the fetch error taxonomy |
//! | [`fetch`] | The fetch pipeline |
//! | [`http_client`] | HTTP client abstraction |
//! | [`monitor`] | Background flush-date polling |
//! | [`retry`] | Backoff schedules |
//! | [`timestamp`] | UTC timestamp type |
//! | [`transport`] | Direct and cross-origin transports |
//! | [`url_builder`] | Template interpolation |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use transitwire_core::{Catalog, ClientConfig, FetchOptions, Fetcher, Params};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Catalog::bundled()?;
//!     let fetcher = Fetcher::with_reqwest(ClientConfig::from_env()?);
//!
//!     let vessels = fetcher
//!         .fetch(catalog.endpoint("vessel_locations")?, Params::new(), &FetchOptions::default())
//!         .await?;
//!     println!("{vessels}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  CachedFetcher  │────▶│   CacheStore     │◀──┐
//! └────────┬────────┘     └──────────────────┘   │
//!          │                                     │
//!          ▼                                     │
//! ┌─────────────────┐     ┌──────────────────┐   │
//! │    Fetcher      │────▶│ Direct / Cross-  │   │
//! │ (contracts,     │     │ origin transport │   │
//! │  url, dates)    │     └──────────────────┘   │
//! └────────▲────────┘                            │
//!          │                                     │
//! ┌────────┴────────┐                            │
//! │  FlushMonitor   │────────────────────────────┘
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use transitwire_core::{FetchError, FetchErrorKind};
//!
//! fn handle_error(error: FetchError) {
//!     match error.kind() {
//!         FetchErrorKind::InputValidation => {
//!             // fix the parameters listed in error.issues()
//!         }
//!         FetchErrorKind::Network | FetchErrorKind::Status if error.retryable() => {
//!             // try again later
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The access code is read from the environment and redacted from logs and `Debug`

pub mod cache;
pub mod cache_policy;
pub mod cached;
pub mod catalog;
pub mod config;
pub mod contract;
pub mod date_codec;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod http_client;
pub mod monitor;
pub mod retry;
pub mod timestamp;
pub mod transport;
pub mod url_builder;

// Caching
pub use cache::{CacheLookup, CacheMode, CacheStore, DomainCacheState, FlushOutcome};
pub use cache_policy::{CachePolicy, CachePolicySettings};
pub use cached::CachedFetcher;

// Catalog and configuration
pub use catalog::{Catalog, EndpointDescriptor};
pub use config::{ClientConfig, ConfigError};

// Contracts and dates
pub use contract::{
    validate_input, validate_output, Contract, ContractViolation, Field, FieldIssue, Params,
};
pub use date_codec::{DateEncoding, DecodedDate};
pub use timestamp::UtcDateTime;

// Environment
pub use environment::{detect, EnvironmentProbe, FixedProbe, ProcessProbe, RuntimeEnvironment};

// Error types
pub use error::{CatalogError, DateError, FetchError, FetchErrorKind, PolicyError};

// Pipeline
pub use fetch::{FetchOptions, Fetcher};
pub use monitor::{DomainWatch, FlushMonitor, MonitorHandle, MonitorSnapshot, PollState};

// HTTP client types
pub use http_client::{
    FixtureHttpClient, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Transports
pub use transport::{
    select_transport, CallbackRegistry, CrossOriginTransport, DirectTransport, HttpScriptHost,
    ScriptElement, ScriptHost, Transport, TransportError, TransportKind, TransportOverride,
    TransportResult,
};
pub use url_builder::{build_url, UrlBuildError};
