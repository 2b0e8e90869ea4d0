use std::env;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Explicit test-mode marker, e.g. `TRANSITWIRE_ENV=test`.
pub const ENVIRONMENT_ENV_VAR: &str = "TRANSITWIRE_ENV";
/// Alternate test-mode marker set by harnesses (`1`, `true`, `yes`).
pub const TEST_MODE_ENV_VAR: &str = "TRANSITWIRE_TEST_MODE";
/// Declares that browser globals are present when not compiled for wasm.
pub const BROWSER_ENV_VAR: &str = "TRANSITWIRE_BROWSER";

/// Runtime context the pipeline is executing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEnvironment {
    Browser,
    Server,
    Test,
}

impl RuntimeEnvironment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Server => "server",
            Self::Test => "test",
        }
    }
}

impl Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the indicators the detector inspects.
pub trait EnvironmentProbe: Send + Sync {
    fn test_marker(&self) -> bool;
    fn browser_globals(&self) -> bool;
}

/// Reads process state on every call; nothing is cached.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessProbe;

impl EnvironmentProbe for ProcessProbe {
    fn test_marker(&self) -> bool {
        let explicit = env::var(ENVIRONMENT_ENV_VAR)
            .map(|value| value.trim().eq_ignore_ascii_case("test"))
            .unwrap_or(false);
        explicit || env::var(TEST_MODE_ENV_VAR).map(|v| is_truthy(&v)).unwrap_or(false)
    }

    fn browser_globals(&self) -> bool {
        cfg!(target_arch = "wasm32")
            || env::var(BROWSER_ENV_VAR).map(|v| is_truthy(&v)).unwrap_or(false)
    }
}

/// Probe whose indicators can be flipped between calls.
#[derive(Debug, Default)]
pub struct FixedProbe {
    test: AtomicBool,
    browser: AtomicBool,
}

impl FixedProbe {
    pub fn new(test: bool, browser: bool) -> Self {
        Self {
            test: AtomicBool::new(test),
            browser: AtomicBool::new(browser),
        }
    }

    pub fn server() -> Self {
        Self::new(false, false)
    }

    pub fn browser() -> Self {
        Self::new(false, true)
    }

    pub fn test() -> Self {
        Self::new(true, false)
    }

    pub fn set_test(&self, value: bool) {
        self.test.store(value, Ordering::SeqCst);
    }

    pub fn set_browser(&self, value: bool) {
        self.browser.store(value, Ordering::SeqCst);
    }
}

impl EnvironmentProbe for FixedProbe {
    fn test_marker(&self) -> bool {
        self.test.load(Ordering::SeqCst)
    }

    fn browser_globals(&self) -> bool {
        self.browser.load(Ordering::SeqCst)
    }
}

/// Test markers win over browser globals; anything else is a server.
pub fn detect_with(probe: &dyn EnvironmentProbe) -> RuntimeEnvironment {
    if probe.test_marker() {
        RuntimeEnvironment::Test
    } else if probe.browser_globals() {
        RuntimeEnvironment::Browser
    } else {
        RuntimeEnvironment::Server
    }
}

pub fn detect() -> RuntimeEnvironment {
    detect_with(&ProcessProbe)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
