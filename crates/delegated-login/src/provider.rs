//! Identity provider configuration and code exchange
//!
//! The provider's protocol is otherwise a black box. The one interaction
//! the application performs itself is turning the authorization code from
//! the callback into an identity:
//! 1. POST the code to `token_endpoint` (with app id, app secret and the
//!    same `redirect_uri` used in the challenge) for an access token
//! 2. GET `userinfo_endpoint` with that access token as a bearer credential

use common::Secret;
use reqwest::Url;
use serde::Deserialize;
use session_guard::SessionUser;
use tracing::debug;

use crate::error::{Error, Result};

/// Registration of this application with the identity provider.
///
/// `app_id` and `app_secret` come from deployment configuration, never from
/// source. `callback_url` is the absolute URL registered with the provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub app_id: String,
    pub app_secret: Secret<String>,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub scope: String,
    pub callback_url: String,
}

impl ProviderConfig {
    /// Refuse blank credentials and non-http(s) endpoints.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(Error::ConfigurationMissing("provider app id".into()));
        }
        if self.app_secret.is_blank() {
            return Err(Error::ConfigurationMissing("provider app secret".into()));
        }
        for (name, value) in [
            ("authorize_endpoint", &self.authorize_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("userinfo_endpoint", &self.userinfo_endpoint),
            ("callback_url", &self.callback_url),
        ] {
            parse_http_url(name, value)?;
        }
        Ok(())
    }

    /// Path component of the registered callback URL.
    pub fn callback_path(&self) -> Result<String> {
        Ok(parse_http_url("callback_url", &self.callback_url)?
            .path()
            .to_string())
    }
}

fn parse_http_url(name: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|e| Error::Config(format!("{name} is not a URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "{name} must use http or https, got {other}"
        ))),
    }
}

/// The signed-in user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderIdentity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<ProviderIdentity> for SessionUser {
    fn from(identity: ProviderIdentity) -> Self {
        SessionUser {
            id: identity.id,
            name: identity.name,
            email: identity.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// HTTP client for the provider's token and user-info endpoints.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    /// Exchange an authorization code for the identity of the user who
    /// authorized it.
    pub async fn resolve_identity(&self, code: &str) -> Result<ProviderIdentity> {
        if code.is_empty() {
            return Err(Error::TokenExchange("authorization code missing".into()));
        }
        let access_token = self.exchange_code(code).await?;
        self.fetch_identity(&access_token).await
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.app_id.as_str()),
                ("client_secret", self.config.app_secret.expose().as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            if status.as_u16() == 400 || status.as_u16() == 401 {
                return Err(Error::ProviderDenied(format!(
                    "token endpoint rejected the code ({status}): {body}"
                )));
            }
            return Err(Error::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;
        debug!("authorization code exchanged");
        Ok(token.access_token)
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ProviderIdentity> {
        let response = self
            .http
            .get(&self.config.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("user info request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TokenExchange(format!(
                "user info endpoint returned {status}"
            )));
        }

        response
            .json::<ProviderIdentity>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid user info response: {e}")))
    }
}
