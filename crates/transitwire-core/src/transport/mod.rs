//! Interchangeable ways of turning a URL into a JSON value.
//!
//! | Strategy | Used when |
//! |----------|-----------|
//! | [`DirectTransport`] | server and test contexts, plain HTTP GET |
//! | [`CrossOriginTransport`] | browser context, callback-wrapped script injection |
//!
//! Both enforce the timeout they are handed; neither retries.

mod cross_origin;
mod direct;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::environment::RuntimeEnvironment;
use crate::http_client::HttpError;

pub use cross_origin::{
    parse_callback_script, CallbackRegistry, CrossOriginTransport, HttpScriptHost, ScriptElement,
    ScriptHost, CALLBACK_PARAM,
};
pub use direct::DirectTransport;

/// Decoded payload of one call plus how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResult {
    pub value: Value,
    pub elapsed: Duration,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("network failure: {message}")]
    Network { message: String },
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response is not valid JSON: {message}")]
    Decode { message: String },
    #[error("call was abandoned: {message}")]
    Aborted { message: String },
}

impl TransportError {
    pub(crate) fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Client-level timeouts carry no budget, so they stay network failures.
impl From<HttpError> for TransportError {
    fn from(error: HttpError) -> Self {
        Self::Network {
            message: error.message().to_owned(),
        }
    }
}

/// Which strategy served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Direct,
    CrossOrigin,
}

impl TransportKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::CrossOrigin => "cross_origin",
        }
    }
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call strategy choice. `Auto` follows the detected environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportOverride {
    #[default]
    Auto,
    Direct,
    CrossOrigin,
}

/// Browsers need the cross-origin strategy; every other context calls directly.
/// An explicit override always wins.
pub const fn select_transport(
    environment: RuntimeEnvironment,
    requested: TransportOverride,
) -> TransportKind {
    match (requested, environment) {
        (TransportOverride::Direct, _) => TransportKind::Direct,
        (TransportOverride::CrossOrigin, _) => TransportKind::CrossOrigin,
        (TransportOverride::Auto, RuntimeEnvironment::Browser) => TransportKind::CrossOrigin,
        (TransportOverride::Auto, RuntimeEnvironment::Server | RuntimeEnvironment::Test) => {
            TransportKind::Direct
        }
    }
}

/// Common strategy interface.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn transport<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResult, TransportError>> + Send + 'a>>;
}
