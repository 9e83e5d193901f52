//! Token issuance
//!
//! `TokenIssuer` is immutable after construction and holds no per-request
//! state, so one instance can be shared across concurrent handlers.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{info, warn};

use crate::claims::{ClaimsBuilder, TokenPayload};
use crate::constants::{DEFAULT_AUDIENCE, DEFAULT_ISSUER, DEFAULT_ROLE, DEFAULT_VALIDITY};
use crate::credential::{AllowList, Credential, CredentialVerifier, VerifiedIdentity};
use crate::error::{Error, Result};
use crate::signer::Signer;

/// Values stamped into every token.
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    pub issuer: String,
    pub audience: String,
    pub validity: Duration,
    pub default_role: String,
}

impl Default for IssuerSettings {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            validity: DEFAULT_VALIDITY,
            default_role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// Successful issuance, shaped for the `{ user, token }` response body.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub user: String,
    pub token: String,
    /// Expiry as unix seconds
    #[serde(skip)]
    pub expires_at: u64,
}

pub struct TokenIssuer<V = AllowList> {
    verifier: V,
    claims: ClaimsBuilder,
    signer: Arc<Signer>,
    issuer: String,
    audience: String,
    validity: Duration,
}

impl<V: CredentialVerifier> TokenIssuer<V> {
    pub fn new(verifier: V, signer: Arc<Signer>, settings: IssuerSettings) -> Self {
        Self {
            verifier,
            claims: ClaimsBuilder::new(settings.default_role),
            signer,
            issuer: settings.issuer,
            audience: settings.audience,
            validity: settings.validity,
        }
    }

    /// Verify `credential` and mint a token valid from now.
    pub fn issue(&self, credential: &Credential) -> Result<IssuedToken> {
        self.issue_at(credential, SystemTime::now())
    }

    /// Verify `credential` and mint a token as if issued at `now`.
    pub fn issue_at(&self, credential: &Credential, now: SystemTime) -> Result<IssuedToken> {
        let Some(identity) = self.verifier.verify(credential) else {
            warn!("credential rejected");
            return Err(Error::InvalidCredential);
        };
        self.issue_for_at(&identity, now)
    }

    /// Mint a token for an identity that was verified elsewhere.
    pub fn issue_for(&self, identity: &VerifiedIdentity) -> Result<IssuedToken> {
        self.issue_for_at(identity, SystemTime::now())
    }

    pub fn issue_for_at(&self, identity: &VerifiedIdentity, now: SystemTime) -> Result<IssuedToken> {
        let issued_at = now.duration_since(UNIX_EPOCH).unwrap_or_default();
        let expires_at = (issued_at + self.validity).as_secs();

        let payload = TokenPayload {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: expires_at,
            claims: self.claims.build(identity),
        };
        let token = self.signer.sign(&payload)?;

        info!(user = %identity.display_name, expires_at, "token issued");

        Ok(IssuedToken {
            user: identity.display_name.clone(),
            token,
            expires_at,
        })
    }

    /// Check signature, issuer, audience and expiry of a presented token.
    pub fn validate(&self, token: &str) -> Result<TokenPayload> {
        self.signer
            .verify(token, Some(self.issuer.as_str()), &self.audience)
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }
}
