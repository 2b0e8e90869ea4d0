//! Background cache invalidation driven by per-domain flush dates.
//!
//! Each watched domain gets one periodic task. On every tick the task fetches the
//! domain's flush-date endpoint through the regular [`Fetcher`] pipeline and applies
//! the observed value to the shared [`CacheStore`]:
//!
//! ```text
//!  Idle ──tick──▶ Polling ──▶ Unchanged | Changed | Failed ──▶ Idle
//! ```
//!
//! A strictly newer date marks every cached key of the domain stale. Equal or older
//! dates never invalidate. Failed polls are logged and leave the stored date alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, FlushOutcome};
use crate::catalog::{Catalog, EndpointDescriptor};
use crate::contract::Params;
use crate::error::{CatalogError, FetchError, PolicyError};
use crate::fetch::{FetchOptions, Fetcher};
use crate::timestamp::UtcDateTime;

/// Phase of a domain's poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollState {
    Idle,
    Polling,
    Unchanged,
    Changed,
    Failed,
}

impl PollState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Failed => "failed",
        }
    }

    fn from_outcome(outcome: &FlushOutcome) -> Self {
        match outcome {
            FlushOutcome::Advanced { .. } => Self::Changed,
            FlushOutcome::Initialized { .. }
            | FlushOutcome::Unchanged
            | FlushOutcome::Regressed { .. } => Self::Unchanged,
        }
    }
}

/// One domain to watch and how often.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainWatch {
    descriptor: EndpointDescriptor,
    poll_interval: Duration,
}

impl DomainWatch {
    /// Polls `descriptor` at its cache policy's poll interval.
    pub fn new(descriptor: EndpointDescriptor) -> Self {
        let poll_interval = descriptor.settings().poll_interval();
        Self {
            descriptor,
            poll_interval,
        }
    }

    pub fn from_catalog(catalog: &Catalog, domain: &str) -> Result<Self, CatalogError> {
        catalog.flush_endpoint(domain).cloned().map(Self::new)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Result<Self, PolicyError> {
        if poll_interval.is_zero() {
            return Err(PolicyError::ZeroPollInterval);
        }
        self.poll_interval = poll_interval;
        Ok(self)
    }

    pub fn domain(&self) -> &str {
        self.descriptor.domain()
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Observable status of a running watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub state: PollState,
    /// Result of the most recent completed cycle.
    pub last: Option<PollState>,
    pub last_outcome: Option<FlushOutcome>,
    pub last_error: Option<FetchError>,
    pub polls: u64,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            state: PollState::Idle,
            last: None,
            last_outcome: None,
            last_error: None,
            polls: 0,
        }
    }
}

pub struct FlushMonitor {
    fetcher: Arc<Fetcher>,
    cache: CacheStore,
    options: FetchOptions,
}

impl FlushMonitor {
    pub fn new(fetcher: Arc<Fetcher>, cache: CacheStore) -> Self {
        Self {
            fetcher,
            cache,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn fetch_flush_date(&self, watch: &DomainWatch) -> Result<UtcDateTime, FetchError> {
        self.fetcher
            .fetch_as::<UtcDateTime>(watch.descriptor(), Params::new(), &self.options)
            .await
    }

    /// Runs a single poll and applies its result to the cache.
    pub async fn poll_once(&self, watch: &DomainWatch) -> Result<FlushOutcome, FetchError> {
        let observed = self.fetch_flush_date(watch).await?;
        let outcome = self.cache.apply_flush_date(watch.domain(), observed).await;

        match outcome {
            FlushOutcome::Advanced {
                previous,
                observed,
                invalidated,
            } => info!(
                domain = watch.domain(),
                previous = %previous,
                observed = %observed,
                invalidated,
                "flush date advanced, cached keys marked stale"
            ),
            FlushOutcome::Regressed { previous, observed } => debug!(
                domain = watch.domain(),
                previous = %previous,
                observed = %observed,
                "flush date moved backwards, keeping cache"
            ),
            FlushOutcome::Initialized { observed } => {
                debug!(domain = watch.domain(), observed = %observed, "flush date recorded")
            }
            FlushOutcome::Unchanged => debug!(domain = watch.domain(), "flush date unchanged"),
        }

        Ok(outcome)
    }

    /// Starts the periodic poll for `watch`. The first poll happens immediately.
    pub fn spawn(self: Arc<Self>, watch: DomainWatch) -> MonitorHandle {
        let (status, receiver) = watch::channel(MonitorSnapshot::default());
        let domain = watch.domain().to_owned();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(watch.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                status.send_modify(|snapshot| snapshot.state = PollState::Polling);

                let result = self.poll_once(&watch).await;
                if let Err(error) = &result {
                    warn!(domain = watch.domain(), error = %error, "flush date poll failed");
                }

                status.send_modify(|snapshot| {
                    snapshot.polls += 1;
                    snapshot.state = PollState::Idle;
                    match result {
                        Ok(outcome) => {
                            snapshot.last = Some(PollState::from_outcome(&outcome));
                            snapshot.last_outcome = Some(outcome);
                            snapshot.last_error = None;
                        }
                        Err(error) => {
                            snapshot.last = Some(PollState::Failed);
                            snapshot.last_error = Some(error);
                        }
                    }
                });
            }
        });

        MonitorHandle {
            domain,
            task,
            status: receiver,
        }
    }

    /// One watch per domain that declares a flush-date endpoint.
    pub fn spawn_all(self: Arc<Self>, catalog: &Catalog) -> Vec<MonitorHandle> {
        catalog
            .domains()
            .into_iter()
            .filter_map(|domain| DomainWatch::from_catalog(catalog, domain).ok())
            .map(|watch| Arc::clone(&self).spawn(watch))
            .collect()
    }
}

/// Running watch. Dropping it stops the task.
pub struct MonitorHandle {
    domain: String,
    task: JoinHandle<()>,
    status: watch::Receiver<MonitorSnapshot>,
}

impl MonitorHandle {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PollState {
        self.status.borrow().state
    }

    pub fn polls(&self) -> u64 {
        self.status.borrow().polls
    }

    /// Waits until at least `count` cycles have completed. Returns false if the
    /// task ended first.
    pub async fn wait_for_polls(&self, count: u64) -> bool {
        self.wait_for_snapshot(count).await.is_some()
    }

    /// Like [`wait_for_polls`](Self::wait_for_polls), returning the snapshot that
    /// satisfied the wait. Its `polls` may exceed `count`.
    pub async fn wait_for_snapshot(&self, count: u64) -> Option<MonitorSnapshot> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|snapshot| snapshot.polls >= count)
            .await
            .map(|snapshot| snapshot.clone())
            .ok();
        reached
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_policy::CachePolicy;
    use crate::config::ClientConfig;
    use crate::contract::Contract;
    use crate::environment::FixedProbe;
    use crate::error::FetchErrorKind;
    use crate::http_client::FixtureHttpClient;

    fn flush_endpoint() -> EndpointDescriptor {
        EndpointDescriptor::new(
            "vessels_cache_flush_date",
            "vessels",
            "/vessels/rest/cacheflushdate",
            Contract::Date,
            CachePolicy::Moderate,
        )
        .as_flush_date()
    }

    fn monitor(client: FixtureHttpClient) -> FlushMonitor {
        let config = ClientConfig::new()
            .with_base_url("https://example.test")
            .expect("valid");
        let fetcher =
            Fetcher::new(config, Arc::new(client)).with_probe(Arc::new(FixedProbe::test()));
        FlushMonitor::new(Arc::new(fetcher), CacheStore::new())
    }

    #[test]
    fn watch_defaults_to_policy_interval() {
        let watch = DomainWatch::new(flush_endpoint());
        assert_eq!(watch.domain(), "vessels");
        assert_eq!(
            watch.poll_interval(),
            CachePolicy::Moderate.settings().poll_interval()
        );
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = DomainWatch::new(flush_endpoint())
            .with_poll_interval(Duration::ZERO)
            .expect_err("zero interval");
        assert_eq!(err, PolicyError::ZeroPollInterval);

        let watch = DomainWatch::new(flush_endpoint())
            .with_poll_interval(Duration::from_millis(5))
            .expect("positive interval");
        assert_eq!(watch.poll_interval(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn waiting_returns_the_snapshot_that_reached_the_count() {
        let client = FixtureHttpClient::new()
            .with_json("/cacheflushdate", r#""\/Date(1700000000000-0800)\/""#);
        let monitor = Arc::new(monitor(client));
        let watch = DomainWatch::new(flush_endpoint())
            .with_poll_interval(Duration::from_millis(5))
            .expect("positive interval");
        let handle = monitor.spawn(watch);

        let snapshot = handle.wait_for_snapshot(2).await.expect("watch running");
        assert!(snapshot.polls >= 2);
        assert_eq!(snapshot.last, Some(PollState::Unchanged));
        assert!(handle.wait_for_polls(3).await);

        handle.stop();
    }

    #[tokio::test]
    async fn first_poll_records_without_invalidating() {
        let client = FixtureHttpClient::new()
            .with_json("/cacheflushdate", r#""\/Date(1700000000000-0800)\/""#);
        let monitor = monitor(client);
        let watch = DomainWatch::new(flush_endpoint());

        let outcome = monitor.poll_once(&watch).await.expect("poll succeeds");
        assert!(matches!(outcome, FlushOutcome::Initialized { .. }));
        assert_eq!(outcome.invalidated(), 0);
    }

    #[tokio::test]
    async fn non_date_payload_fails_the_poll() {
        let client = FixtureHttpClient::new().with_json("/cacheflushdate", r#""soon""#);
        let monitor = monitor(client);

        let err = monitor
            .poll_once(&DomainWatch::new(flush_endpoint()))
            .await
            .expect_err("not a date");
        assert_eq!(err.kind(), FetchErrorKind::OutputValidation);
        assert!(monitor.cache().domain_state("vessels").await.is_none());
    }
}
