//! Claim sets and the token payload

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::credential::VerifiedIdentity;

/// Claim types this issuer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimType {
    Name,
    Role,
    /// Stable id assigned by an external identity provider
    Subject,
}

impl ClaimType {
    /// Payload key for this claim type
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Name => "name",
            ClaimType::Role => "role",
            ClaimType::Subject => "sub",
        }
    }
}

/// Claims keyed by type. At most one value per type: inserting a type again
/// replaces the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, String>);

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ClaimType, value: impl Into<String>) {
        self.0.insert(kind.as_str().to_string(), value.into());
    }

    pub fn get(&self, kind: ClaimType) -> Option<&str> {
        self.0.get(kind.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decoded token body: registered claims plus the flattened claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub iss: String,
    pub aud: String,
    /// Expiry as unix seconds
    pub exp: u64,
    #[serde(flatten)]
    pub claims: ClaimSet,
}

/// Maps a verified identity to its claim set.
#[derive(Debug, Clone)]
pub struct ClaimsBuilder {
    default_role: String,
}

impl ClaimsBuilder {
    pub fn new(default_role: impl Into<String>) -> Self {
        Self {
            default_role: default_role.into(),
        }
    }

    /// `name` from the identity and `role` from the default. Identities
    /// vouched for by a provider also carry their `sub`.
    pub fn build(&self, identity: &VerifiedIdentity) -> ClaimSet {
        let mut claims = ClaimSet::new();
        claims.insert(ClaimType::Name, identity.display_name.clone());
        claims.insert(ClaimType::Role, self.default_role.clone());
        if let Some(subject) = &identity.subject {
            claims.insert(ClaimType::Subject, subject.clone());
        }
        claims
    }
}
