//! Service-specific error types

use thiserror::Error;

/// Startup errors raised while wiring the gateway from its configuration.
///
/// Per-request failures (rejected credentials, denied logins, bad state)
/// are turned into HTTP responses by the handlers and never propagate as
/// Rust errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Token signer setup failed: {0}")]
    Signer(#[from] bearer_token::Error),

    #[error("Delegated login setup failed: {0}")]
    DelegatedLogin(#[from] delegated_login::Error),
}

impl From<common::Error> for Error {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::Missing(what) => Error::ConfigurationMissing(what),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
