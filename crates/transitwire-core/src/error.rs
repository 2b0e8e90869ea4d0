use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::contract::{ContractViolation, FieldIssue};
use crate::transport::TransportError;

/// Date decoding failures raised by the date codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("'{value}' is neither a legacy /Date(ms)/ value nor an ISO-8601 timestamp")]
    Unrecognized { value: String },
    #[error("date value '{value}' is outside the supported range (years 0000-9999)")]
    OutOfRange { value: String },
    #[error("expected a date string, found {found}")]
    NotAString { found: &'static str },
}

/// Cache policy construction failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("stale window ({stale_after_ms} ms) must not exceed hard expiry ({expire_after_ms} ms)")]
    StaleExceedsExpiry {
        stale_after_ms: u128,
        expire_after_ms: u128,
    },
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("invalid cache policy '{value}', expected one of realtime, frequent, moderate, static")]
    UnknownPolicy { value: String },
}

/// Endpoint catalog loading and lookup failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("failed to read catalog '{path}': {message}")]
    Io { path: String, message: String },
    #[error("catalog is not valid JSON: {0}")]
    Json(String),
    #[error("endpoint '{id}' is declared more than once")]
    DuplicateEndpoint { id: String },
    #[error("endpoint '{id}' is not in the catalog")]
    EndpointNotFound { id: String },
    #[error("domain '{domain}' has no flush-date endpoint")]
    NoFlushEndpoint { domain: String },
    #[error("flush-date endpoint '{id}' must declare a date output contract")]
    InvalidFlushEndpoint { id: String },
    #[error("domain '{domain}' declares more than one flush-date endpoint")]
    DuplicateFlushEndpoint { domain: String },
    #[error("endpoint '{id}' has an invalid url template: {message}")]
    InvalidTemplate { id: String, message: String },
}

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Caller supplied parameters the input contract rejects.
    InputValidation,
    /// Remote returned a payload the output contract rejects.
    OutputValidation,
    /// Timeout, DNS failure, connection reset and friends.
    Network,
    /// Remote answered with a non-2xx status.
    Status,
    Unknown,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::OutputValidation => "output_validation",
            Self::Network => "network",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error returned by every fetch.
///
/// Carries the endpoint identifier and a readable detail. Retry eligibility is a
/// property of the classification; retry state lives with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    endpoint: String,
    message: String,
    status: Option<u16>,
    issues: Vec<FieldIssue>,
}

impl FetchError {
    fn new(kind: FetchErrorKind, endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            message: message.into(),
            status: None,
            issues: Vec::new(),
        }
    }

    pub fn input_validation(endpoint: impl Into<String>, violation: ContractViolation) -> Self {
        let mut error = Self::new(
            FetchErrorKind::InputValidation,
            endpoint,
            format!("invalid parameters: {violation}"),
        );
        error.issues = violation.into_issues();
        error
    }

    pub fn output_validation(endpoint: impl Into<String>, violation: ContractViolation) -> Self {
        let mut error = Self::new(
            FetchErrorKind::OutputValidation,
            endpoint,
            format!("unexpected response shape: {violation}"),
        );
        error.issues = violation.into_issues();
        error
    }

    pub fn malformed_output(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::OutputValidation, endpoint, message)
    }

    pub fn invalid_request(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::InputValidation, endpoint, message)
    }

    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, endpoint, message)
    }

    pub fn status(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let mut error = Self::new(FetchErrorKind::Status, endpoint, message);
        error.status = Some(status);
        error
    }

    pub fn unknown(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unknown, endpoint, message)
    }

    /// Maps a transport failure onto the classified taxonomy.
    pub fn from_transport(endpoint: impl Into<String>, error: TransportError) -> Self {
        let endpoint = endpoint.into();
        match error {
            TransportError::Timeout { .. } | TransportError::Network { .. } => {
                Self::network(endpoint, error.to_string())
            }
            TransportError::Status { status, .. } => {
                Self::status(endpoint, status, error.to_string())
            }
            TransportError::Decode { .. } => Self::malformed_output(endpoint, error.to_string()),
            TransportError::Aborted { .. } => Self::unknown(endpoint, error.to_string()),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Remote HTTP status, when the failure came from one.
    pub const fn status_code(&self) -> Option<u16> {
        self.status
    }

    /// Every offending field for validation failures.
    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Network failures and 5xx statuses may succeed on a later attempt; nothing else will.
    pub fn retryable(&self) -> bool {
        match self.kind {
            FetchErrorKind::Network => true,
            FetchErrorKind::Status => self.status.is_some_and(|status| status >= 500),
            FetchErrorKind::InputValidation
            | FetchErrorKind::OutputValidation
            | FetchErrorKind::Unknown => false,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::InputValidation => "fetch.input_validation",
            FetchErrorKind::OutputValidation => "fetch.output_validation",
            FetchErrorKind::Network => "fetch.network",
            FetchErrorKind::Status => "fetch.status",
            FetchErrorKind::Unknown => "fetch.unknown",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.endpoint, self.message, self.code())
    }
}

impl std::error::Error for FetchError {}
