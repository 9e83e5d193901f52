//! Bearer token issuance
//!
//! Verifies a submitted credential, maps the verified identity to a claim
//! set, and signs `{iss, aud, exp, claims}` as an HS256 compact token. The
//! issuer keeps no state after returning a token.
//!
//! Issuance flow:
//! 1. `CredentialVerifier::verify()` turns a `Credential` into a `VerifiedIdentity`
//! 2. `ClaimsBuilder::build()` produces the `name` and `role` claims
//! 3. `TokenIssuer` stamps issuer, audience and expiry
//! 4. `Signer::sign()` serializes and signs the payload

pub mod claims;
pub mod constants;
pub mod credential;
pub mod error;
pub mod issuer;
pub mod signer;

pub use claims::{ClaimSet, ClaimType, ClaimsBuilder, TokenPayload};
pub use constants::*;
pub use credential::{AllowList, Credential, CredentialVerifier, VerifiedIdentity};
pub use error::{Error, Result};
pub use issuer::{IssuedToken, IssuerSettings, TokenIssuer};
pub use signer::Signer;
