//! Read-only endpoint catalog.
//!
//! Catalogs are JSON documents of the form `{ "endpoints": [ ... ] }`. Each entry
//! names its domain, URL template, contracts and cache policy; at most one entry per
//! domain is tagged `"flush_date": true` and returns that domain's last-changed date.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache_policy::{CachePolicy, CachePolicySettings};
use crate::contract::{Contract, Params};
use crate::error::CatalogError;
use crate::url_builder::placeholders;

const BUNDLED_FERRIES: &str = include_str!("../catalogs/ferries.json");

/// Immutable description of one remote endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    id: String,
    domain: String,
    url_template: String,
    #[serde(default = "Contract::empty")]
    input: Contract,
    output: Contract,
    cache_policy: CachePolicy,
    #[serde(default)]
    sample_params: Params,
    #[serde(default)]
    flush_date: bool,
}

impl EndpointDescriptor {
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        url_template: impl Into<String>,
        output: Contract,
        cache_policy: CachePolicy,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            url_template: url_template.into(),
            input: Contract::empty(),
            output,
            cache_policy,
            sample_params: Params::new(),
            flush_date: false,
        }
    }

    pub fn with_input(mut self, input: Contract) -> Self {
        self.input = input;
        self
    }

    pub fn with_sample_params(mut self, sample_params: Params) -> Self {
        self.sample_params = sample_params;
        self
    }

    /// Tags the endpoint as its domain's flush-date source.
    pub fn as_flush_date(mut self) -> Self {
        self.flush_date = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn input(&self) -> &Contract {
        &self.input
    }

    pub fn output(&self) -> &Contract {
        &self.output
    }

    pub const fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    pub fn settings(&self) -> CachePolicySettings {
        self.cache_policy.settings()
    }

    pub fn sample_params(&self) -> &Params {
        &self.sample_params
    }

    pub const fn is_flush_date(&self) -> bool {
        self.flush_date
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    endpoints: Vec<EndpointDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    endpoints: Vec<EndpointDescriptor>,
    by_id: HashMap<String, usize>,
    flush_by_domain: HashMap<String, usize>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids, malformed templates and bad flush entries.
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(endpoints.len());
        let mut flush_by_domain = HashMap::new();

        for (index, endpoint) in endpoints.iter().enumerate() {
            if by_id.insert(endpoint.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateEndpoint {
                    id: endpoint.id.clone(),
                });
            }

            placeholders(&endpoint.url_template).map_err(|e| CatalogError::InvalidTemplate {
                id: endpoint.id.clone(),
                message: e.to_string(),
            })?;

            if endpoint.flush_date {
                if endpoint.output != Contract::Date {
                    return Err(CatalogError::InvalidFlushEndpoint {
                        id: endpoint.id.clone(),
                    });
                }
                if flush_by_domain
                    .insert(endpoint.domain.clone(), index)
                    .is_some()
                {
                    return Err(CatalogError::DuplicateFlushEndpoint {
                        domain: endpoint.domain.clone(),
                    });
                }
            }
        }

        Ok(Self {
            endpoints,
            by_id,
            flush_by_domain,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument =
            serde_json::from_str(json).map_err(|e| CatalogError::Json(e.to_string()))?;
        Self::new(document.endpoints)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    /// Washington State Ferries vessels and fares endpoints.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json_str(BUNDLED_FERRIES)
    }

    pub fn get(&self, id: &str) -> Option<&EndpointDescriptor> {
        self.by_id.get(id).map(|&index| &self.endpoints[index])
    }

    pub fn endpoint(&self, id: &str) -> Result<&EndpointDescriptor, CatalogError> {
        self.get(id).ok_or_else(|| CatalogError::EndpointNotFound { id: id.to_owned() })
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.endpoints.iter()
    }

    pub fn by_domain<'a>(
        &'a self,
        domain: &'a str,
    ) -> impl Iterator<Item = &'a EndpointDescriptor> {
        self.endpoints
            .iter()
            .filter(move |endpoint| endpoint.domain == domain)
    }

    pub fn flush_endpoint(&self, domain: &str) -> Result<&EndpointDescriptor, CatalogError> {
        self.flush_by_domain
            .get(domain)
            .map(|&index| &self.endpoints[index])
            .ok_or_else(|| CatalogError::NoFlushEndpoint {
                domain: domain.to_owned(),
            })
    }

    pub fn domains(&self) -> BTreeSet<&str> {
        self.endpoints
            .iter()
            .map(|endpoint| endpoint.domain.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
