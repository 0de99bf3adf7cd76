//! Error types shared by the backend clients and start-up configuration.

use thiserror::Error;

/// Failures reported by the identity provider or the assessment store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AlreadyRegistered,

    #[error("Record does not conform: {0}")]
    InvalidRecord(String),

    #[error("Storage rejected the record: {0}")]
    Rejected(String),

    #[error("Backend error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected backend response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set together with {1}")]
    MissingPair(&'static str, &'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
