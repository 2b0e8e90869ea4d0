use serde_json::{json, Value};
use transitwire_core::{Catalog, EndpointDescriptor};

use crate::cli::EndpointsArgs;

pub fn run(args: &EndpointsArgs, catalog: &Catalog) -> Value {
    let endpoints: Vec<Value> = catalog
        .iter()
        .filter(|endpoint| {
            args.domain
                .as_deref()
                .is_none_or(|domain| endpoint.domain() == domain)
        })
        .map(describe)
        .collect();

    json!({ "endpoints": endpoints })
}

fn describe(endpoint: &EndpointDescriptor) -> Value {
    json!({
        "id": endpoint.id(),
        "domain": endpoint.domain(),
        "url_template": endpoint.url_template(),
        "cache_policy": endpoint.cache_policy(),
        "flush_date": endpoint.is_flush_date(),
        "sample_params": endpoint.sample_params(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_bundled_catalog_by_domain() {
        let catalog = Catalog::bundled().expect("bundled catalog loads");
        let output = run(
            &EndpointsArgs {
                domain: Some(String::from("fares")),
            },
            &catalog,
        );

        let endpoints = output["endpoints"].as_array().expect("array");
        assert!(!endpoints.is_empty());
        assert!(endpoints.iter().all(|e| e["domain"] == "fares"));
        assert!(endpoints
            .iter()
            .any(|e| e["id"] == "fares_cache_flush_date" && e["flush_date"] == true));
    }
}
