use serde_json::{json, Value};
use transitwire_core::Params;

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::Context;

pub async fn run(args: &FetchArgs, context: &Context) -> Result<Value, CliError> {
    let endpoint = context.catalog.endpoint(&args.endpoint)?;
    let params = if args.sample {
        endpoint.sample_params().clone()
    } else {
        parse_params(&args.params)?
    };

    let data = context
        .fetcher
        .fetch(endpoint, params, &context.options)
        .await?;

    Ok(json!({
        "endpoint": endpoint.id(),
        "domain": endpoint.domain(),
        "data": data,
    }))
}

/// `NAME=VALUE` pairs; values that parse as JSON keep their JSON type.
fn parse_params(raw: &[String]) -> Result<Params, CliError> {
    let mut params = Params::new();
    for pair in raw {
        let (name, value) = pair
            .split_once('=')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| CliError::InvalidParam(pair.clone()))?;
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_owned()));
        params.insert(name.trim().to_owned(), value);
    }
    Ok(params)
}
