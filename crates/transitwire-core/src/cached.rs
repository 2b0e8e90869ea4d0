use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheLookup, CacheMode, CacheStore};
use crate::catalog::EndpointDescriptor;
use crate::contract::Params;
use crate::error::FetchError;
use crate::fetch::{FetchOptions, Fetcher};
use crate::retry::RetryConfig;

/// Caller-side cache and retry layer over a [`Fetcher`].
#[derive(Clone)]
pub struct CachedFetcher {
    fetcher: Arc<Fetcher>,
    cache: CacheStore,
    options: FetchOptions,
    retry_override: Option<RetryConfig>,
}

impl CachedFetcher {
    pub fn new(fetcher: Arc<Fetcher>, cache: CacheStore) -> Self {
        Self {
            fetcher,
            cache,
            options: FetchOptions::default(),
            retry_override: None,
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses `retry` for every endpoint instead of the policy-derived schedule.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry_override = Some(retry);
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// `id` plus the parameters in key order, e.g. `terminals?TripDate="2024-06-01"`.
    pub fn cache_key(descriptor: &EndpointDescriptor, params: &Params) -> String {
        let mut pairs: Vec<(&String, &Value)> = params.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut key = String::from(descriptor.id());
        for (index, (name, value)) in pairs.into_iter().enumerate() {
            key.push(if index == 0 { '?' } else { '&' });
            key.push_str(name);
            key.push('=');
            key.push_str(&value.to_string());
        }
        key
    }

    pub async fn get(
        &self,
        descriptor: &EndpointDescriptor,
        params: Params,
        mode: CacheMode,
    ) -> Result<Value, FetchError> {
        let key = Self::cache_key(descriptor, &params);

        if mode == CacheMode::Use {
            match self.cache.get(&key).await {
                CacheLookup::Fresh(value) => {
                    debug!(endpoint = descriptor.id(), key = %key, "cache hit");
                    return Ok(value);
                }
                CacheLookup::Stale(_) => {
                    debug!(endpoint = descriptor.id(), key = %key, "cache stale");
                }
                CacheLookup::Miss => debug!(endpoint = descriptor.id(), key = %key, "cache miss"),
            }
        }

        let value = self.fetch_with_retry(descriptor, params).await?;

        if mode != CacheMode::Bypass {
            self.cache
                .set(key, descriptor.domain(), value.clone(), &descriptor.settings())
                .await;
        }
        Ok(value)
    }

    async fn fetch_with_retry(
        &self,
        descriptor: &EndpointDescriptor,
        params: Params,
    ) -> Result<Value, FetchError> {
        let retry = self
            .retry_override
            .clone()
            .unwrap_or_else(|| RetryConfig::from_policy(&descriptor.settings()));

        let mut attempt = 0;
        loop {
            match self
                .fetcher
                .fetch(descriptor, params.clone(), &self.options)
                .await
            {
                Ok(value) => return Ok(value),
                Err(error) if attempt < retry.max_retries && retry.should_retry(&error) => {
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(
                        endpoint = descriptor.id(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_policy::CachePolicy;
    use crate::contract::Contract;
    use serde_json::json;

    #[test]
    fn cache_key_is_order_independent() {
        let descriptor =
            EndpointDescriptor::new("fares", "fares", "/fares", Contract::Any, CachePolicy::Static);
        let mut forward = Params::new();
        forward.insert(String::from("b"), json!(2));
        forward.insert(String::from("a"), json!("x"));
        let mut reverse = Params::new();
        reverse.insert(String::from("a"), json!("x"));
        reverse.insert(String::from("b"), json!(2));

        let key = CachedFetcher::cache_key(&descriptor, &forward);
        assert_eq!(key, "fares?a=\"x\"&b=2");
        assert_eq!(key, CachedFetcher::cache_key(&descriptor, &reverse));
        assert_eq!(CachedFetcher::cache_key(&descriptor, &Params::new()), "fares");
    }
}
