//! Error types for token issuance and verification

/// Errors from issuing or verifying bearer tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The credential did not match any accepted identity. Carries no detail.
    #[error("invalid credential")]
    InvalidCredential,

    #[error("signing secret is missing or blank")]
    MissingSecret,

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Result alias for token operations.
pub type Result<T> = std::result::Result<T, Error>;
