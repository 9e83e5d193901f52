//! Error types for the delegated login round trip

/// Errors from starting or completing a delegated login.
///
/// None of these leave the session half signed in: on any error the
/// `SessionState` is exactly what it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("provider denied the login: {0}")]
    ProviderDenied(String),

    /// `state` was missing, forged, expired, or pointed back at the callback.
    #[error("correlation failed: {0}")]
    CorrelationFailure(String),

    #[error("invalid return destination: {0}")]
    InvalidDestination(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("state signing failed: {0}")]
    Signing(String),
}

/// Result alias for delegated login operations.
pub type Result<T> = std::result::Result<T, Error>;
