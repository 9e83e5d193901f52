//! Signed `state` parameter for the provider round trip
//!
//! The state is a short-lived HS256 token whose audience is the callback
//! URL. It carries the return destination and a random nonce, so every
//! challenge produces a distinct value and nothing needs to be remembered
//! server-side between the challenge and the callback.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bearer_token::Signer;
use rand::RngExt;
use serde::{Deserialize, Serialize};

use crate::destination::ReturnDestination;
use crate::error::{Error, Result};

/// Maximum age of a login state before the callback is refused.
pub const STATE_TTL: Duration = Duration::from_secs(600); // 10 minutes

#[derive(Debug, Serialize, Deserialize)]
struct CorrelationClaims {
    aud: String,
    exp: u64,
    /// Return destination
    ret: String,
    nonce: String,
}

/// Random 128-bit nonce, URL-safe base64 without padding.
fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Sign `destination` into a state value bound to `callback_url`.
pub fn seal(
    signer: &Signer,
    callback_url: &str,
    destination: &ReturnDestination,
    now: SystemTime,
    ttl: Duration,
) -> Result<String> {
    let issued_at = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let claims = CorrelationClaims {
        aud: callback_url.to_string(),
        exp: (issued_at + ttl).as_secs(),
        ret: destination.as_str().to_string(),
        nonce: generate_nonce(),
    };
    signer
        .sign(&claims)
        .map_err(|e| Error::Signing(e.to_string()))
}

/// Verify a state value echoed by the provider and recover its destination.
pub fn open(signer: &Signer, callback_url: &str, state: &str) -> Result<ReturnDestination> {
    if state.is_empty() {
        return Err(Error::CorrelationFailure("state parameter missing".into()));
    }
    let claims: CorrelationClaims = signer
        .verify(state, None, callback_url)
        .map_err(|e| Error::CorrelationFailure(e.to_string()))?;
    ReturnDestination::parse(Some(&claims.ret))
        .map_err(|e| Error::CorrelationFailure(e.to_string()))
}
