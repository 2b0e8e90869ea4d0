use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use transitwire_core::{CacheStore, DomainWatch, FlushMonitor, MonitorSnapshot};

use crate::cli::WatchArgs;
use crate::error::CliError;

use super::{outcome_json, Context};

pub async fn run(args: &WatchArgs, context: &Context) -> Result<Value, CliError> {
    let mut watch = DomainWatch::from_catalog(&context.catalog, &args.domain)?;
    if let Some(interval_ms) = args.interval_ms {
        watch = watch.with_poll_interval(Duration::from_millis(interval_ms))?;
    }
    let interval = watch.poll_interval();

    let monitor = Arc::new(
        FlushMonitor::new(Arc::clone(&context.fetcher), CacheStore::new())
            .with_options(context.options),
    );
    let handle = monitor.spawn(watch);

    let mut polls = Vec::new();
    let mut seen = 0;
    while seen < args.polls {
        let Some(snapshot) = handle.wait_for_snapshot(seen + 1).await else {
            return Err(CliError::WatchInterrupted(args.domain.clone()));
        };
        seen = snapshot.polls;
        polls.push(poll_json(&snapshot));
    }
    handle.stop();

    Ok(json!({
        "domain": args.domain,
        "interval_ms": interval.as_millis() as u64,
        "polls": polls,
    }))
}

fn poll_json(snapshot: &MonitorSnapshot) -> Value {
    let cycle = snapshot.polls;
    match (&snapshot.last_error, &snapshot.last_outcome) {
        (Some(error), _) => json!({
            "poll": cycle,
            "result": "failed",
            "error": error.to_string(),
            "code": error.code(),
        }),
        (None, Some(outcome)) => {
            let mut value = outcome_json(outcome);
            value["poll"] = json!(cycle);
            value
        }
        (None, None) => json!({ "poll": cycle, "result": "pending" }),
    }
}
