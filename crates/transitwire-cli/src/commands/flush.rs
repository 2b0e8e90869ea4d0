use serde_json::{json, Value};
use transitwire_core::{DomainWatch, Params, UtcDateTime};

use crate::cli::FlushDateArgs;
use crate::error::CliError;

use super::Context;

pub async fn run(args: &FlushDateArgs, context: &Context) -> Result<Value, CliError> {
    let watch = DomainWatch::from_catalog(&context.catalog, &args.domain)?;
    let flush_date: UtcDateTime = context
        .fetcher
        .fetch_as(watch.descriptor(), Params::new(), &context.options)
        .await?;

    Ok(json!({
        "domain": watch.domain(),
        "endpoint": watch.descriptor().id(),
        "flush_date": flush_date,
    }))
}
