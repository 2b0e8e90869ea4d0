//! Caller-side retry with exponential backoff and jitter.
//!
//! The fetch pipeline itself never retries; [`crate::CachedFetcher`] consults a
//! [`RetryConfig`] derived from the endpoint's cache policy.

use std::time::Duration;

use crate::cache_policy::CachePolicySettings;
use crate::error::{FetchError, FetchErrorKind};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(500), Duration::from_secs(5))
    }
}

impl Backoff {
    /// Doubling schedule with jitter.
    pub const fn exponential(base: Duration, max: Duration) -> Self {
        Self::Exponential {
            base,
            factor: 2.0,
            max,
            jitter: true,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds.max(0.0));

                if !jitter {
                    return delay;
                }

                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX / 2);
                let spread = millis / 2;
                let offset = fastrand::u64(0..=spread * 2);
                Duration::from_millis((millis - spread).saturating_add(offset))
            }
        }
    }

    /// Same schedule without randomness.
    pub const fn without_jitter(self) -> Self {
        match self {
            Self::Fixed { delay } => Self::Fixed { delay },
            Self::Exponential {
                base, factor, max, ..
            } => Self::Exponential {
                base,
                factor,
                max,
                jitter: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_network: bool,
    pub retry_server_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_network: true,
            retry_server_errors: true,
        }
    }
}

impl RetryConfig {
    pub fn from_policy(settings: &CachePolicySettings) -> Self {
        Self {
            enabled: settings.retry_count() > 0,
            max_retries: settings.retry_count(),
            backoff: settings.retry_backoff(),
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Validation failures and client errors are never retried.
    pub fn should_retry(&self, error: &FetchError) -> bool {
        if !self.enabled {
            return false;
        }
        match error.kind() {
            FetchErrorKind::Network => self.retry_on_network,
            FetchErrorKind::Status => self.retry_server_errors && error.retryable(),
            FetchErrorKind::InputValidation
            | FetchErrorKind::OutputValidation
            | FetchErrorKind::Unknown => false,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_policy::CachePolicy;
    use crate::contract::ContractViolation;

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_secs(1))
            .without_jitter();

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_the_delay() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_secs(1));
        for _ in 0..20 {
            for attempt in 0..5 {
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                let delay = backoff.delay(attempt).as_millis() as f64;
                assert!(delay >= expected * 0.49, "attempt={attempt} delay={delay}");
                assert!(delay <= expected * 1.51, "attempt={attempt} delay={delay}");
            }
        }
    }

    #[test]
    fn retries_only_transient_failures() {
        let config = RetryConfig::fixed(Duration::ZERO, 2);

        assert!(config.should_retry(&FetchError::network("e", "reset")));
        assert!(config.should_retry(&FetchError::status("e", 502, "bad gateway")));
        assert!(!config.should_retry(&FetchError::status("e", 404, "missing")));
        assert!(!config.should_retry(&FetchError::input_validation(
            "e",
            ContractViolation::single("id", "required field is missing")
        )));
        assert!(!config.should_retry(&FetchError::unknown("e", "aborted")));
        assert!(!RetryConfig::no_retry().should_retry(&FetchError::network("e", "reset")));
    }

    #[test]
    fn policy_drives_retry_budget() {
        let settings = CachePolicy::RealTime.settings();
        let config = RetryConfig::from_policy(&settings);
        assert!(config.enabled);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.backoff, settings.retry_backoff());
    }
}
