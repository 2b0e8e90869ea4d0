//! Shared in-memory store for validated responses and per-domain flush state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::cache_policy::CachePolicySettings;
use crate::timestamp::UtcDateTime;

/// How a caller-side fetch uses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve fresh entries; fetch and store otherwise.
    #[default]
    Use,
    /// Always fetch, then store.
    Refresh,
    /// Always fetch; never read or write.
    Bypass,
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(Value),
    /// Present but due for a refetch.
    Stale(Value),
    Miss,
}

/// Outcome of applying an observed flush date to a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// First observation for the domain; stored without invalidating.
    Initialized { observed: UtcDateTime },
    Unchanged,
    /// Older than the stored value; stored, nothing invalidated.
    Regressed {
        previous: UtcDateTime,
        observed: UtcDateTime,
    },
    Advanced {
        previous: UtcDateTime,
        observed: UtcDateTime,
        invalidated: usize,
    },
}

impl FlushOutcome {
    pub const fn invalidated(&self) -> usize {
        match self {
            Self::Advanced { invalidated, .. } => *invalidated,
            Self::Initialized { .. } | Self::Unchanged | Self::Regressed { .. } => 0,
        }
    }
}

/// Last observed flush date plus the keys cached for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainCacheState {
    changed_at: Option<UtcDateTime>,
    keys: BTreeSet<String>,
}

impl DomainCacheState {
    pub const fn changed_at(&self) -> Option<UtcDateTime> {
        self.changed_at
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    domain: String,
    stored_at: Instant,
    stale: bool,
    stale_after: Duration,
    expire_after: Duration,
    follows_flush_date: bool,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.expire_after
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    domains: HashMap<String, DomainCacheState>,
}

impl CacheInner {
    fn lookup(&self, key: &str) -> CacheLookup {
        let Some(entry) = self.entries.get(key) else {
            return CacheLookup::Miss;
        };
        let now = Instant::now();
        if entry.expired(now) {
            return CacheLookup::Miss;
        }
        if entry.stale {
            return CacheLookup::Stale(entry.value.clone());
        }
        let tracked = entry.follows_flush_date
            && self
                .domains
                .get(&entry.domain)
                .is_some_and(|state| state.changed_at.is_some());
        if tracked || now.saturating_duration_since(entry.stored_at) < entry.stale_after {
            CacheLookup::Fresh(entry.value.clone())
        } else {
            CacheLookup::Stale(entry.value.clone())
        }
    }

    fn forget_key(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(state) = self.domains.get_mut(&entry.domain) {
            state.keys.remove(key);
        }
        Some(entry)
    }

    fn mark_domain_stale(&mut self, domain: &str) -> usize {
        let Some(state) = self.domains.get(domain) else {
            return 0;
        };
        let mut marked = 0;
        for key in &state.keys {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }
}

/// Thread-safe cache shared by the caller-side fetcher and the flush monitor.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> CacheLookup {
        self.inner.read().await.lookup(key)
    }

    /// Stores `value` under `key` and registers the key with `domain`.
    pub async fn set(
        &self,
        key: impl Into<String>,
        domain: impl Into<String>,
        value: Value,
        settings: &CachePolicySettings,
    ) {
        let key = key.into();
        let domain = domain.into();
        let mut store = self.inner.write().await;

        store.forget_key(&key);
        store
            .domains
            .entry(domain.clone())
            .or_default()
            .keys
            .insert(key.clone());
        store.entries.insert(
            key,
            CacheEntry {
                value,
                domain,
                stored_at: Instant::now(),
                stale: false,
                stale_after: settings.stale_after(),
                expire_after: settings.expire_after(),
                follows_flush_date: settings.follows_flush_date(),
            },
        );
    }

    /// Returns false when the key is not cached.
    pub async fn mark_stale(&self, key: &str) -> bool {
        let mut store = self.inner.write().await;
        match store.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Marks every cached key of `domain` stale and returns how many were marked.
    pub async fn mark_domain_stale(&self, domain: &str) -> usize {
        self.inner.write().await.mark_domain_stale(domain)
    }

    pub async fn domain_keys(&self, domain: &str) -> BTreeSet<String> {
        self.inner
            .read()
            .await
            .domains
            .get(domain)
            .map(|state| state.keys.clone())
            .unwrap_or_default()
    }

    pub async fn domain_state(&self, domain: &str) -> Option<DomainCacheState> {
        self.inner.read().await.domains.get(domain).cloned()
    }

    /// Compares `observed` with the stored flush date and invalidates the domain when
    /// it moved forward. Comparison, store and invalidation happen under one write lock.
    pub async fn apply_flush_date(&self, domain: &str, observed: UtcDateTime) -> FlushOutcome {
        let mut store = self.inner.write().await;
        let state = store.domains.entry(domain.to_owned()).or_default();
        let previous = state.changed_at.replace(observed);

        match previous {
            None => FlushOutcome::Initialized { observed },
            Some(previous) if observed == previous => FlushOutcome::Unchanged,
            Some(previous) if observed < previous => FlushOutcome::Regressed { previous, observed },
            Some(previous) => {
                let invalidated = store.mark_domain_stale(domain);
                FlushOutcome::Advanced {
                    previous,
                    observed,
                    invalidated,
                }
            }
        }
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.inner.write().await.forget_key(key).is_some()
    }

    /// Drops every entry. Flush dates survive.
    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.entries.clear();
        for state in store.domains.values_mut() {
            state.keys.clear();
        }
    }

    /// Drops entries past their hard expiry and returns how many were removed.
    pub async fn clear_expired(&self) -> usize {
        let mut store = self.inner.write().await;
        let now = Instant::now();
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            store.forget_key(key);
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
