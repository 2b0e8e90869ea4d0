use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::retry::Backoff;

/// Freshness class attached to every endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CachePolicy {
    #[serde(rename = "realtime")]
    RealTime,
    #[serde(rename = "frequent")]
    Frequent,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "static")]
    Static,
}

impl CachePolicy {
    pub const ALL: [Self; 4] = [Self::RealTime, Self::Frequent, Self::Moderate, Self::Static];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RealTime => "realtime",
            Self::Frequent => "frequent",
            Self::Moderate => "moderate",
            Self::Static => "static",
        }
    }

    pub fn settings(self) -> CachePolicySettings {
        let (stale, expire, poll, timeout, retries, base, max) = match self {
            Self::RealTime => (5, 60, 5, 10, 2, 500, 5_000),
            Self::Frequent => (60, 600, 60, 15, 3, 1_000, 15_000),
            Self::Moderate => (300, 3_600, 300, 20, 3, 2_000, 30_000),
            Self::Static => (3_600, 86_400, 300, 30, 5, 5_000, 60_000),
        };
        CachePolicySettings {
            stale_after: Duration::from_secs(stale),
            expire_after: Duration::from_secs(expire),
            poll_interval: Duration::from_secs(poll),
            request_timeout: Duration::from_secs(timeout),
            retry_count: retries,
            retry_backoff: Backoff::exponential(
                Duration::from_millis(base),
                Duration::from_millis(max),
            ),
            follows_flush_date: !matches!(self, Self::RealTime),
        }
    }
}

impl Display for CachePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = PolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| PolicyError::UnknownPolicy {
                value: value.to_owned(),
            })
    }
}

/// Concrete timing values behind a [`CachePolicy`].
///
/// `stale_after <= expire_after` always holds; the only way to build one with
/// custom values is [`CachePolicySettings::new`], which checks it.
///
/// When `follows_flush_date` is set, entries of a domain with a known flush date
/// stay fresh past `stale_after` until the monitor invalidates them. Real-time
/// settings never follow it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicySettings {
    stale_after: Duration,
    expire_after: Duration,
    poll_interval: Duration,
    request_timeout: Duration,
    retry_count: u32,
    retry_backoff: Backoff,
    follows_flush_date: bool,
}

impl CachePolicySettings {
    pub fn new(
        stale_after: Duration,
        expire_after: Duration,
        poll_interval: Duration,
        request_timeout: Duration,
        retry_count: u32,
        retry_backoff: Backoff,
    ) -> Result<Self, PolicyError> {
        if stale_after > expire_after {
            return Err(PolicyError::StaleExceedsExpiry {
                stale_after_ms: stale_after.as_millis(),
                expire_after_ms: expire_after.as_millis(),
            });
        }
        if poll_interval.is_zero() {
            return Err(PolicyError::ZeroPollInterval);
        }
        if request_timeout.is_zero() {
            return Err(PolicyError::ZeroTimeout);
        }
        Ok(Self {
            stale_after,
            expire_after,
            poll_interval,
            request_timeout,
            retry_count,
            retry_backoff,
            follows_flush_date: true,
        })
    }

    #[must_use]
    pub const fn with_flush_tracking(mut self, follows_flush_date: bool) -> Self {
        self.follows_flush_date = follows_flush_date;
        self
    }

    pub const fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub const fn expire_after(&self) -> Duration {
        self.expire_after
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub const fn retry_backoff(&self) -> Backoff {
        self.retry_backoff
    }

    pub const fn follows_flush_date(&self) -> bool {
        self.follows_flush_date
    }
}

impl From<CachePolicy> for CachePolicySettings {
    fn from(policy: CachePolicy) -> Self {
        policy.settings()
    }
}
