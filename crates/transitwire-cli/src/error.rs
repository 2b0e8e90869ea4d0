use thiserror::Error;
use transitwire_core::{CatalogError, ConfigError, FetchError, FetchErrorKind, PolicyError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid parameter '{0}', expected NAME=VALUE")]
    InvalidParam(String),

    #[error("watch for '{0}' stopped before completing its polls")]
    WatchInterrupted(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Catalog(_) | Self::Policy(_) | Self::InvalidParam(_) => 2,
            Self::Fetch(error) => match error.kind() {
                FetchErrorKind::InputValidation => 2,
                FetchErrorKind::Network | FetchErrorKind::Status => 3,
                FetchErrorKind::OutputValidation => 4,
                FetchErrorKind::Unknown => 1,
            },
            Self::WatchInterrupted(_) => 1,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_map_by_kind() {
        assert_eq!(CliError::from(FetchError::network("e", "reset")).exit_code(), 3);
        assert_eq!(CliError::from(FetchError::status("e", 404, "missing")).exit_code(), 3);
        assert_eq!(
            CliError::from(FetchError::malformed_output("e", "not json")).exit_code(),
            4
        );
        assert_eq!(CliError::InvalidParam(String::from("x")).exit_code(), 2);
        assert_eq!(CliError::from(PolicyError::ZeroPollInterval).exit_code(), 2);
    }
}
