//! Shared fixtures for the behavior suites.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use transitwire_core::{
    CachePolicy, ClientConfig, Contract, EndpointDescriptor, Fetcher, Field, FixedProbe,
    FixtureHttpClient, Params,
};

pub const BASE_URL: &str = "https://example.test";

pub fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        other => panic!("params fixture must be an object, got {other}"),
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new()
        .with_base_url(BASE_URL)
        .expect("fixture base url is valid")
}

/// Fetcher over `client` whose environment is controlled by `probe`.
pub fn fetcher(client: Arc<FixtureHttpClient>, probe: Arc<FixedProbe>) -> Fetcher {
    Fetcher::new(config(), client).with_probe(probe)
}

pub fn vessel_locations() -> EndpointDescriptor {
    EndpointDescriptor::new(
        "vessel_locations",
        "vessels",
        "/vessels/rest/vessellocations",
        Contract::array_of(Contract::object(vec![
            Field::required("VesselID", Contract::Integer),
            Field::required("VesselName", Contract::String),
            Field::nullable("LeftDock", Contract::Date),
            Field::required("TimeStamp", Contract::Date),
        ])),
        CachePolicy::RealTime,
    )
}

pub fn vessel_by_id() -> EndpointDescriptor {
    EndpointDescriptor::new(
        "vessel_basics_by_id",
        "vessels",
        "/vessels/rest/vesselbasics/{VesselID}",
        Contract::object(vec![
            Field::required("VesselID", Contract::Integer),
            Field::required("VesselName", Contract::String),
        ]),
        CachePolicy::Static,
    )
    .with_input(Contract::object(vec![Field::required(
        "VesselID",
        Contract::Integer,
    )]))
}

pub fn vessels_flush_date() -> EndpointDescriptor {
    EndpointDescriptor::new(
        "vessels_cache_flush_date",
        "vessels",
        "/vessels/rest/cacheflushdate",
        Contract::Date,
        CachePolicy::Moderate,
    )
    .as_flush_date()
}

pub const VESSEL_LOCATIONS_BODY: &str = r#"[
    {"VesselID": 2, "VesselName": "Chelan", "LeftDock": null,
     "TimeStamp": "\/Date(1700000000000-0800)\/", "Speed": 0.0},
    {"VesselID": 15, "VesselName": "Kitsap", "LeftDock": "\/Date(1699999000000-0800)\/",
     "TimeStamp": "\/Date(1700000000000-0800)\/", "Speed": 14.2}
]"#;

/// JSON string body for a legacy-encoded flush date.
pub fn legacy_date_body(millis: i64) -> String {
    format!("\"\\/Date({millis}-0800)\\/\"")
}
