//! Credentials and the pluggable verification policy

use std::collections::HashSet;

use serde::Deserialize;

/// Identity input submitted by a caller. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub display_name: String,
    /// Provider-assigned id; `None` for identities from the local policy.
    pub subject: Option<String>,
}

impl VerifiedIdentity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            subject: None,
        }
    }

    /// Identity vouched for by an external provider under a stable id.
    pub fn with_subject(subject: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            subject: Some(subject.into()),
        }
    }
}

/// Decides whether a credential maps to a known identity.
///
/// Returns `None` for every rejection; callers learn nothing about why.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &Credential) -> Option<VerifiedIdentity>;
}

impl<F> CredentialVerifier for F
where
    F: Fn(&Credential) -> Option<VerifiedIdentity> + Send + Sync,
{
    fn verify(&self, credential: &Credential) -> Option<VerifiedIdentity> {
        self(credential)
    }
}

/// Exact, case-sensitive match against a fixed set of accepted identities.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    accepted: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

impl CredentialVerifier for AllowList {
    fn verify(&self, credential: &Credential) -> Option<VerifiedIdentity> {
        self.accepted
            .get(credential.as_str())
            .map(|name| VerifiedIdentity::new(name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_exact_match() {
        let list = AllowList::new(["Prerak"]);
        assert_eq!(
            list.verify(&Credential::new("Prerak")),
            Some(VerifiedIdentity::new("Prerak"))
        );
    }

    #[test]
    fn allow_list_rejects_everything_else() {
        let list = AllowList::new(["Prerak"]);
        for attempt in ["eve", "prerak", "Prerak ", "", "PRERAK"] {
            assert!(
                list.verify(&Credential::new(attempt)).is_none(),
                "{attempt:?} must be rejected"
            );
        }
    }

    #[test]
    fn empty_allow_list_rejects_all() {
        let list = AllowList::default();
        assert!(list.is_empty());
        assert!(list.verify(&Credential::new("Prerak")).is_none());
    }

    #[test]
    fn closures_are_verifiers() {
        let verifier = |c: &Credential| {
            c.as_str()
                .strip_prefix("user:")
                .map(|name| VerifiedIdentity::new(name.to_uppercase()))
        };
        assert_eq!(
            verifier.verify(&Credential::new("user:ada")),
            Some(VerifiedIdentity::new("ADA"))
        );
        assert!(verifier.verify(&Credential::new("ada")).is_none());
    }

    #[test]
    fn credential_deserializes_from_json_string() {
        let credential: Credential = serde_json::from_str(r#""Prerak""#).unwrap();
        assert_eq!(credential.as_str(), "Prerak");
    }
}
