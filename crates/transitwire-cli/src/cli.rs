//! CLI argument definitions for transitwire.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `endpoints` | List catalog endpoints |
//! | `fetch` | Call one endpoint and print the validated payload |
//! | `flush-date` | Print a domain's current flush date |
//! | `watch` | Poll a domain's flush date and report invalidations |
//!
//! # Examples
//!
//! ```bash
//! transitwire endpoints --domain fares
//! transitwire fetch terminals --param TripDate=2024-06-01 --pretty
//! transitwire fetch fare_line_items_basic --sample --transport cross-origin
//! transitwire watch vessels --polls 3 --interval-ms 2000
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use transitwire_core::TransportOverride;

#[derive(Debug, Parser)]
#[command(
    name = "transitwire",
    author,
    version,
    about = "Typed client for legacy transit REST endpoints"
)]
pub struct Cli {
    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Endpoint catalog to load instead of the bundled ferries catalog.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Transport strategy; `auto` follows the detected environment.
    #[arg(long, global = true, value_enum, default_value_t = TransportArg::Auto)]
    pub transport: TransportArg,

    /// Request timeout in milliseconds. Defaults to the endpoint's cache policy.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List catalog endpoints.
    Endpoints(EndpointsArgs),
    /// Fetch one endpoint.
    Fetch(FetchArgs),
    /// Print the flush date of a domain.
    FlushDate(FlushDateArgs),
    /// Poll a domain's flush date.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct EndpointsArgs {
    /// Only list endpoints of this domain.
    #[arg(long)]
    pub domain: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Endpoint id from the catalog.
    pub endpoint: String,

    /// Request parameter as `name=value`. Values that parse as JSON keep their type.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Use the catalog's sample parameters.
    #[arg(long, default_value_t = false, conflicts_with = "params")]
    pub sample: bool,
}

#[derive(Debug, Args)]
pub struct FlushDateArgs {
    pub domain: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    pub domain: String,

    /// Number of poll cycles before exiting.
    #[arg(long, default_value_t = 1)]
    pub polls: u64,

    /// Poll interval in milliseconds. Defaults to the endpoint's cache policy.
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Auto,
    Direct,
    CrossOrigin,
}

impl From<TransportArg> for TransportOverride {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Auto => Self::Auto,
            TransportArg::Direct => Self::Direct,
            TransportArg::CrossOrigin => Self::CrossOrigin,
        }
    }
}
