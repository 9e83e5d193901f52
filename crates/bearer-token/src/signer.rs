//! HS256 signing and verification
//!
//! Wraps the process-wide signing secret. Both the bearer tokens and the
//! OAuth correlation state are signed with the same key, so a secret
//! rotation invalidates every outstanding token and in-flight login.

use common::Secret;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Symmetric signer keyed once at startup and shared read-only afterwards.
pub struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Signer {
    /// Key a signer from the configured secret.
    ///
    /// A blank secret is refused: signing with an empty key would produce
    /// tokens anyone can forge.
    pub fn new(secret: &Secret<String>) -> Result<Self> {
        if secret.is_blank() {
            return Err(Error::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.expose_bytes()),
            decoding_key: DecodingKey::from_secret(secret.expose_bytes()),
        })
    }

    /// Serialize `claims` and sign them as a compact `header.payload.signature` token.
    ///
    /// The header is always `{"typ":"JWT","alg":"HS256"}`, so the output is a
    /// pure function of the claims and the key.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::Signing(e.to_string()))
    }

    /// Verify signature, expiry and audience (and issuer, when given), then
    /// decode the payload.
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        issuer: Option<&str>,
        audience: &str,
    ) -> Result<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        match issuer {
            Some(iss) => {
                validation.set_issuer(&[iss]);
                validation.set_required_spec_claims(&["exp", "aud", "iss"]);
            }
            None => validation.set_required_spec_claims(&["exp", "aud"]),
        }

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::Expired,
                _ => Error::InvalidToken(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde::Deserialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Probe {
        iss: String,
        aud: String,
        exp: u64,
        note: String,
    }

    fn signer(key: &str) -> Signer {
        Signer::new(&Secret::new(key.to_string())).unwrap()
    }

    fn probe(exp: u64) -> Probe {
        Probe {
            iss: "myapi.com".into(),
            aud: "myapi.com".into(),
            exp,
            note: "hello".into(),
        }
    }

    fn in_one_hour() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 3600
    }

    #[test]
    fn blank_secret_is_refused() {
        let result = Signer::new(&Secret::new("   ".to_string()));
        assert!(matches!(result, Err(Error::MissingSecret)));
    }

    #[test]
    fn token_has_three_segments_and_hs256_header() {
        let token = signer("k").sign(&probe(in_one_hour())).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn signing_is_deterministic() {
        let s = signer("k");
        let claims = probe(1_900_000_000);
        assert_eq!(s.sign(&claims).unwrap(), s.sign(&claims).unwrap());
    }

    #[test]
    fn verify_roundtrips_claims() {
        let s = signer("k");
        let claims = probe(in_one_hour());
        let token = s.sign(&claims).unwrap();
        let decoded: Probe = s.verify(&token, Some("myapi.com"), "myapi.com").unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn different_secret_fails_verification() {
        let token = signer("key-a").sign(&probe(in_one_hour())).unwrap();
        let result: Result<Probe> = signer("key-b").verify(&token, None, "myapi.com");
        assert!(matches!(result, Err(Error::InvalidToken(_))));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let s = signer("k");
        let token = s.sign(&probe(1_000_000_000)).unwrap();
        let result: Result<Probe> = s.verify(&token, None, "myapi.com");
        assert!(matches!(result, Err(Error::Expired)), "got {result:?}");
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let s = signer("k");
        let token = s.sign(&probe(in_one_hour())).unwrap();
        let result: Result<Probe> = s.verify(&token, None, "other.example");
        assert!(matches!(result, Err(Error::InvalidToken(_))));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let s = signer("k");
        let token = s.sign(&probe(in_one_hour())).unwrap();
        let result: Result<Probe> = s.verify(&token, Some("evil.example"), "myapi.com");
        assert!(matches!(result, Err(Error::InvalidToken(_))));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let s = signer("k");
        let token = s.sign(&probe(in_one_hour())).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut forged = probe(in_one_hour());
        forged.note = "admin".into();
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let result: Result<Probe> = s.verify(&forged_token, None, "myapi.com");
        assert!(result.is_err());
    }
}
