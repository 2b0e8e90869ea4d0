use std::env;
use std::fmt::{Debug, Formatter};

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://www.wsdot.wa.gov/ferries/api";
pub const ACCESS_CODE_ENV_VAR: &str = "TRANSITWIRE_ACCESS_CODE";
pub const LEGACY_ACCESS_CODE_ENV_VAR: &str = "WSDOT_ACCESS_CODE";
pub const BASE_URL_ENV_VAR: &str = "TRANSITWIRE_BASE_URL";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base url '{value}' must start with http:// or https://")]
    InvalidBaseUrl { value: String },
}

/// Connection settings handed explicitly to the fetch pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    access_code: Option<String>,
    base_url: String,
    user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_code: None,
            base_url: String::from(DEFAULT_BASE_URL),
            user_agent: String::from(concat!("transitwire/", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the access code and base URL from the process environment.
    ///
    /// `TRANSITWIRE_ACCESS_CODE` wins over `WSDOT_ACCESS_CODE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut config = Self {
            access_code: present(ACCESS_CODE_ENV_VAR)
                .or_else(|| present(LEGACY_ACCESS_CODE_ENV_VAR)),
            ..Self::default()
        };
        if let Some(base_url) = present(BASE_URL_ENV_VAR) {
            config = config.with_base_url(base_url)?;
        }
        Ok(config)
    }

    pub fn with_access_code(mut self, access_code: impl Into<String>) -> Self {
        self.access_code = Some(access_code.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl { value: base_url });
        }
        self.base_url = trimmed.trim_end_matches('/').to_owned();
        Ok(self)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn access_code(&self) -> Option<&str> {
        self.access_code.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_code", &self.access_code.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
