use std::io::Write;
use std::sync::Arc;

use transitwire_core::{
    url_builder::placeholders, CachePolicy, Catalog, CatalogError, ClientConfig, Contract, Fetcher,
    FixedProbe, FixtureHttpClient,
};

fn offline_fetcher() -> Fetcher {
    let config = ClientConfig::new()
        .with_base_url("https://example.test")
        .expect("valid base url")
        .with_access_code("contract-key");
    Fetcher::new(config, Arc::new(FixtureHttpClient::new()))
        .with_probe(Arc::new(FixedProbe::test()))
}

#[test]
fn bundled_catalog_declares_one_flush_endpoint_per_domain() {
    let catalog = Catalog::bundled().expect("bundled catalog loads");
    assert!(!catalog.is_empty());

    for domain in catalog.domains() {
        let flush = catalog
            .flush_endpoint(domain)
            .unwrap_or_else(|error| panic!("domain '{domain}': {error}"));
        assert!(flush.is_flush_date(), "domain '{domain}'");
        assert_eq!(flush.output(), &Contract::Date, "domain '{domain}'");
        assert_eq!(
            catalog.by_domain(domain).filter(|e| e.is_flush_date()).count(),
            1,
            "domain '{domain}': flush endpoint count"
        );
    }
}

#[test]
fn realtime_endpoints_never_wait_on_flush_dates() {
    let catalog = Catalog::bundled().expect("bundled catalog loads");
    let realtime: Vec<_> = catalog
        .iter()
        .filter(|endpoint| endpoint.cache_policy() == CachePolicy::RealTime)
        .collect();
    assert!(!realtime.is_empty());

    for endpoint in realtime {
        assert!(
            !endpoint.settings().follows_flush_date(),
            "endpoint '{}'",
            endpoint.id()
        );
    }
}

#[test]
fn every_sample_renders_a_request_url() {
    let catalog = Catalog::bundled().expect("bundled catalog loads");
    let fetcher = offline_fetcher();

    for endpoint in catalog.iter() {
        let url = fetcher
            .request_url(endpoint, endpoint.sample_params().clone())
            .unwrap_or_else(|error| panic!("endpoint '{}': {error}", endpoint.id()));

        assert!(
            url.starts_with("https://example.test/"),
            "endpoint '{}': {url}",
            endpoint.id()
        );
        assert!(
            url.ends_with("apiaccesscode=contract-key"),
            "endpoint '{}': credential must be the last pair in {url}",
            endpoint.id()
        );
        assert!(!url.contains('{'), "endpoint '{}': {url}", endpoint.id());
    }
}

#[test]
fn endpoints_with_placeholders_ship_samples_for_each() {
    let catalog = Catalog::bundled().expect("bundled catalog loads");

    for endpoint in catalog.iter() {
        let names = placeholders(endpoint.url_template())
            .unwrap_or_else(|error| panic!("endpoint '{}': {error}", endpoint.id()));
        for name in names {
            assert!(
                endpoint.sample_params().contains_key(&name),
                "endpoint '{}': no sample for '{name}'",
                endpoint.id()
            );
        }
    }
}

#[test]
fn catalog_files_load_from_disk() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{"endpoints": [{{
            "id": "routes_cache_flush_date",
            "domain": "routes",
            "url_template": "/routes/rest/cacheflushdate",
            "output": {{ "type": "date" }},
            "cache_policy": "moderate",
            "flush_date": true
        }}]}}"#
    )
    .expect("write catalog");

    let catalog = Catalog::from_path(file.path()).expect("catalog loads");
    assert_eq!(catalog.len(), 1);
    assert_eq!(
        catalog
            .flush_endpoint("routes")
            .expect("flush endpoint")
            .id(),
        "routes_cache_flush_date"
    );
}

#[test]
fn unreadable_or_malformed_catalogs_are_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = Catalog::from_path(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(CatalogError::Io { .. })));

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{{\"endpoints\": [").expect("write catalog");
    let malformed = Catalog::from_path(file.path());
    assert!(matches!(malformed, Err(CatalogError::Json(_))));

    let unknown = Catalog::bundled()
        .expect("bundled catalog loads")
        .endpoint("vessel_history")
        .map(|endpoint| endpoint.id().to_owned());
    assert!(matches!(unknown, Err(CatalogError::EndpointNotFound { .. })));
}
