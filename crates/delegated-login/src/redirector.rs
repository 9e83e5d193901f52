//! Challenge construction and callback completion
//!
//! The provider's `redirect_uri` and the application's return destination
//! are two separate values with separate jobs. The provider always returns
//! to the fixed, registered callback URL; only after the callback handler
//! finishes is the user forwarded to the return destination. Sending the
//! return destination as `redirect_uri` (or returning to the callback path
//! after login) breaks correlation, so both are rejected here.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bearer_token::Signer;
use reqwest::Url;
use session_guard::SessionState;
use tracing::{info, warn};

use crate::correlation::{self, STATE_TTL};
use crate::destination::ReturnDestination;
use crate::error::{Error, Result};
use crate::provider::{ProviderConfig, ProviderIdentity};

/// Everything needed to send the user agent to the provider.
#[derive(Debug, Clone)]
pub struct LoginChallenge {
    /// Full provider URL to redirect the user agent to
    pub authorization_url: String,
    /// Fixed callback the provider returns to (`redirect_uri`)
    pub callback_url: String,
    /// Where the user lands after the callback completes
    pub return_destination: ReturnDestination,
    /// Signed correlation value sent as `state`
    pub state: String,
}

/// What the provider reported on the callback leg.
#[derive(Debug, Clone)]
pub enum ProviderOutcome {
    Authenticated(ProviderIdentity),
    Denied { reason: String },
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// `state` echoed back by the provider
    pub state: String,
    pub outcome: ProviderOutcome,
}

pub struct OAuthRedirector {
    provider: ProviderConfig,
    callback_path: String,
    signer: Arc<Signer>,
    state_ttl: Duration,
}

impl OAuthRedirector {
    /// Validates the provider registration; blank app credentials are a
    /// `ConfigurationMissing` error.
    pub fn new(provider: ProviderConfig, signer: Arc<Signer>) -> Result<Self> {
        provider.validate()?;
        let callback_path = provider.callback_path()?;
        Ok(Self {
            provider,
            callback_path,
            signer,
            state_ttl: STATE_TTL,
        })
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    pub fn callback_url(&self) -> &str {
        &self.provider.callback_url
    }

    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    /// Build the provider challenge for a login that should end at
    /// `return_destination`.
    pub fn begin_login(&self, return_destination: Option<&str>) -> Result<LoginChallenge> {
        self.begin_login_at(return_destination, SystemTime::now())
    }

    pub fn begin_login_at(
        &self,
        return_destination: Option<&str>,
        now: SystemTime,
    ) -> Result<LoginChallenge> {
        let destination = ReturnDestination::parse(return_destination)?;
        self.ensure_distinct_from_callback(&destination)?;

        let state = correlation::seal(
            &self.signer,
            &self.provider.callback_url,
            &destination,
            now,
            self.state_ttl,
        )?;

        let authorization_url = Url::parse_with_params(
            &self.provider.authorize_endpoint,
            &[
                ("client_id", self.provider.app_id.as_str()),
                ("redirect_uri", self.provider.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", self.provider.scope.as_str()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| Error::Config(format!("authorize_endpoint is not a URL: {e}")))?;

        info!(return_destination = %destination, "delegated login initiated");

        Ok(LoginChallenge {
            authorization_url: authorization_url.into(),
            callback_url: self.provider.callback_url.clone(),
            return_destination: destination,
            state,
        })
    }

    /// Verify the `state` echoed on the callback and recover the destination.
    pub fn resume(&self, state: &str) -> Result<ReturnDestination> {
        let destination = correlation::open(&self.signer, &self.provider.callback_url, state)?;
        self.ensure_distinct_from_callback(&destination)?;
        Ok(destination)
    }

    /// Finish the round trip: on success the session becomes logged in and
    /// its subscribers are notified before this returns.
    ///
    /// On any error the session is left untouched.
    pub fn complete_login(
        &self,
        response: ProviderResponse,
        session: &SessionState,
    ) -> Result<ReturnDestination> {
        let identity = match response.outcome {
            ProviderOutcome::Authenticated(identity) => identity,
            ProviderOutcome::Denied { reason } => {
                warn!(reason = %reason, "provider denied login");
                return Err(Error::ProviderDenied(reason));
            }
        };

        let destination = self.resume(&response.state).inspect_err(|e| {
            warn!(error = %e, "login callback failed correlation");
        })?;

        session.log_in(identity.into());
        info!(return_destination = %destination, "delegated login completed");
        Ok(destination)
    }

    fn ensure_distinct_from_callback(&self, destination: &ReturnDestination) -> Result<()> {
        if destination.path().trim_end_matches('/') == self.callback_path.trim_end_matches('/') {
            return Err(Error::CorrelationFailure(format!(
                "return destination {destination} is the provider callback path"
            )));
        }
        Ok(())
    }
}
