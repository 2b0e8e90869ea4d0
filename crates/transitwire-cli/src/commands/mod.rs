mod endpoints;
mod fetch;
mod flush;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;
use transitwire_core::{Catalog, ClientConfig, FetchOptions, Fetcher, FlushOutcome};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub catalog: Catalog,
    pub fetcher: Arc<Fetcher>,
    pub options: FetchOptions,
}

impl Context {
    fn new(cli: &Cli, catalog: Catalog) -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;

        let mut options = FetchOptions::default().with_transport(cli.transport.into());
        if let Some(timeout_ms) = cli.timeout_ms {
            options = options.with_timeout(Duration::from_millis(timeout_ms));
        }

        Ok(Self {
            catalog,
            fetcher: Arc::new(Fetcher::with_reqwest(config)),
            options,
        })
    }
}

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::bundled()?,
    };

    if let Command::Endpoints(args) = &cli.command {
        return Ok(endpoints::run(args, &catalog));
    }

    let context = Context::new(cli, catalog)?;
    debug!(command = ?cli.command, transport = ?context.options.transport, "dispatching");
    match &cli.command {
        Command::Endpoints(args) => Ok(endpoints::run(args, &context.catalog)),
        Command::Fetch(args) => fetch::run(args, &context).await,
        Command::FlushDate(args) => flush::run(args, &context).await,
        Command::Watch(args) => watch::run(args, &context).await,
    }
}

pub(crate) fn outcome_json(outcome: &FlushOutcome) -> Value {
    match outcome {
        FlushOutcome::Initialized { observed } => json!({
            "result": "initialized",
            "observed": observed,
            "invalidated": 0,
        }),
        FlushOutcome::Unchanged => json!({ "result": "unchanged", "invalidated": 0 }),
        FlushOutcome::Regressed { previous, observed } => json!({
            "result": "regressed",
            "previous": previous,
            "observed": observed,
            "invalidated": 0,
        }),
        FlushOutcome::Advanced {
            previous,
            observed,
            invalidated,
        } => json!({
            "result": "advanced",
            "previous": previous,
            "observed": observed,
            "invalidated": invalidated,
        }),
    }
}
