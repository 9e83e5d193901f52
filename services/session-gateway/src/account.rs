//! Delegated login endpoints and the cookie session
//!
//! The cookie session is the sign-in scheme: once the provider round trip
//! completes, the gateway mints a token for the provider identity and
//! stores it in the `session` cookie. The provider is the challenge scheme:
//! protected pages without a session send the user to the login view,
//! which links to `/account/fblogin`.
//!
//! Endpoints:
//! - GET {login_path}?ReturnUrl=: login view (JSON stand-in)
//! - GET /account/fblogin?ReturnUrl=: 303 to the provider
//! - GET {callback_path}: provider callback, sets the cookie
//! - GET /account/logout: clears the cookie
//! - GET /dashboard: cookie-protected page

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use bearer_token::{ClaimType, TokenIssuer, VerifiedIdentity};
use delegated_login::{
    OAuthRedirector, ProviderClient, ProviderOutcome, ProviderResponse, ReturnDestination,
};
use reqwest::Url;
use serde::Deserialize;
use session_guard::{
    Navigation, NavigationContext, RouteTable, SessionGuard, SessionState, SessionUser,
};
use tracing::{info, warn};

use crate::metrics::{self, ServiceStats};
use crate::token::server_error;

pub const SESSION_COOKIE: &str = "session";
pub const PROVIDER_LOGIN_PATH: &str = "/account/fblogin";
pub const LOGOUT_PATH: &str = "/account/logout";
pub const DASHBOARD_PATH: &str = "/dashboard";

fn log_blocked_navigation(message: &str) {
    info!(alert = message, "navigation blocked");
}

/// Shared state for account handlers.
#[derive(Clone)]
pub struct AccountState {
    redirector: Arc<OAuthRedirector>,
    provider: ProviderClient,
    session_issuer: Arc<TokenIssuer>,
    routes: Arc<RouteTable>,
    guard: Arc<SessionGuard<fn(&str)>>,
    public_base_url: String,
    login_path: String,
    secure_cookies: bool,
    stats: ServiceStats,
}

impl AccountState {
    pub fn new(
        redirector: Arc<OAuthRedirector>,
        provider: ProviderClient,
        session_issuer: Arc<TokenIssuer>,
        public_base_url: &str,
        login_path: &str,
        stats: ServiceStats,
    ) -> Self {
        let routes = RouteTable::new()
            .public("/")
            .login(login_path)
            .protected(DASHBOARD_PATH);
        let notifier: fn(&str) = log_blocked_navigation;
        Self {
            redirector,
            provider,
            session_issuer,
            routes: Arc::new(routes),
            guard: Arc::new(SessionGuard::new(notifier)),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            login_path: login_path.to_string(),
            secure_cookies: public_base_url.starts_with("https://"),
            stats,
        }
    }

    fn session_cookie(&self, token: &str, max_age_secs: u64) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Login path, carrying the destination when one is known.
    fn login_redirect(&self, destination: Option<&ReturnDestination>) -> Response {
        let location = match destination {
            Some(dest) if dest.as_str() != "/" => {
                match Url::parse_with_params(
                    &format!("{}{}", self.public_base_url, self.login_path),
                    &[("ReturnUrl", dest.as_str())],
                ) {
                    Ok(url) => format!("{}?{}", url.path(), url.query().unwrap_or_default()),
                    Err(_) => self.login_path.clone(),
                }
            }
            _ => self.login_path.clone(),
        };
        Redirect::to(&location).into_response()
    }

    /// Rebuild the visitor's session from the `session` cookie.
    ///
    /// Only tokens minted by the session issuer for a provider identity
    /// count; API bearer tokens fail the audience check.
    fn session_from_cookies(&self, headers: &HeaderMap) -> SessionState {
        let session = SessionState::new();
        let Some(token) = cookie_value(headers, SESSION_COOKIE) else {
            return session;
        };
        let payload = match self.session_issuer.validate(token) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "session cookie refused");
                return session;
            }
        };
        let Some(id) = payload.claims.get(ClaimType::Subject) else {
            warn!("session cookie without provider subject refused");
            return session;
        };
        session.log_in(SessionUser {
            id: id.to_string(),
            name: payload
                .claims
                .get(ClaimType::Name)
                .unwrap_or_default()
                .to_string(),
            email: None,
        });
        session
    }
}

pub fn build_account_router(state: AccountState) -> Router {
    let login_path = state.login_path.clone();
    let callback_path = state.redirector.callback_path().to_string();
    Router::new()
        .route(&login_path, get(login_view))
        .route(PROVIDER_LOGIN_PATH, get(provider_login))
        .route(&callback_path, get(provider_callback))
        .route(LOGOUT_PATH, get(logout))
        .route(DASHBOARD_PATH, get(dashboard))
        .with_state(state)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "error": {
                "type": "invalid_request",
                "message": message,
            }
        })
        .to_string(),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct ReturnQuery {
    #[serde(rename = "ReturnUrl")]
    return_url: Option<String>,
}

/// GET {login_path}: what a login page would render: the provider link.
async fn login_view(State(state): State<AccountState>, Query(query): Query<ReturnQuery>) -> Response {
    let destination = match ReturnDestination::parse(query.return_url.as_deref()) {
        Ok(dest) => dest,
        Err(e) => return bad_request(&e.to_string()),
    };

    let provider_login_url = match Url::parse_with_params(
        &format!("{}{PROVIDER_LOGIN_PATH}", state.public_base_url),
        &[("ReturnUrl", destination.as_str())],
    ) {
        Ok(url) => url,
        Err(e) => return server_error(&format!("cannot build login link: {e}")),
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "view": "login",
            "provider_login_url": provider_login_url.as_str(),
            "return_url": destination.as_str(),
        })
        .to_string(),
    )
        .into_response()
}

/// GET /account/fblogin: challenge the provider.
///
/// `redirect_uri` is always the registered callback; `ReturnUrl` only
/// travels inside the signed state.
async fn provider_login(
    State(state): State<AccountState>,
    Query(query): Query<ReturnQuery>,
) -> Response {
    match state.redirector.begin_login(query.return_url.as_deref()) {
        Ok(challenge) => Redirect::to(&challenge.authorization_url).into_response(),
        Err(e) => {
            warn!(error = %e, "login challenge refused");
            bad_request(&e.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET {callback_path}: the provider's return leg.
///
/// Success sets the session cookie and forwards to the return destination.
/// Every failure leaves the visitor without a session on the login path.
async fn provider_callback(
    State(state): State<AccountState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let correlation = query.state.unwrap_or_default();

    let destination = match state.redirector.resume(&correlation) {
        Ok(dest) => dest,
        Err(e) => {
            warn!(error = %e, "provider callback failed correlation");
            metrics::record_login("correlation_failure");
            return state.login_redirect(None);
        }
    };

    let outcome = match (query.error, query.code) {
        (Some(error), _) => ProviderOutcome::Denied {
            reason: query.error_description.unwrap_or(error),
        },
        (None, Some(code)) => match state.provider.resolve_identity(&code).await {
            Ok(identity) => ProviderOutcome::Authenticated(identity),
            Err(delegated_login::Error::ProviderDenied(reason)) => {
                ProviderOutcome::Denied { reason }
            }
            Err(e) => {
                warn!(error = %e, "provider code exchange failed");
                metrics::record_login("error");
                return state.login_redirect(Some(&destination));
            }
        },
        (None, None) => ProviderOutcome::Denied {
            reason: "callback carried neither code nor error".into(),
        },
    };

    let session = SessionState::new();
    let response = ProviderResponse {
        state: correlation,
        outcome,
    };
    let destination = match state.redirector.complete_login(response, &session) {
        Ok(dest) => dest,
        Err(delegated_login::Error::ProviderDenied(_)) => {
            metrics::record_login("denied");
            return state.login_redirect(Some(&destination));
        }
        Err(e) => {
            warn!(error = %e, "login completion failed");
            metrics::record_login("correlation_failure");
            return state.login_redirect(None);
        }
    };

    let Some(user) = session.user() else {
        metrics::record_login("error");
        return server_error("session not established after login");
    };

    let identity = VerifiedIdentity::with_subject(user.id.clone(), user.name.clone());
    let issued = match state.session_issuer.issue_for(&identity) {
        Ok(issued) => issued,
        Err(e) => {
            metrics::record_login("error");
            return server_error(&format!("session token issuance failed: {e}"));
        }
    };

    metrics::record_login("success");
    state.stats.login_completed();
    info!(user_id = %user.id, destination = %destination, "session established");

    let max_age = state.session_issuer.validity().as_secs();
    let cookie = state.session_cookie(&issued.token, max_age);
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, destination.to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// GET /account/logout: drop the session cookie.
async fn logout(State(state): State<AccountState>, headers: HeaderMap) -> Response {
    let session = state.session_from_cookies(&headers);
    if let Some(user) = session.user() {
        info!(user = %user.name, "logged out");
    }
    session.log_out();

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, state.session_cookie("", 0)),
        ],
    )
        .into_response()
}

/// GET /dashboard: protected page stand-in.
async fn dashboard(State(state): State<AccountState>, headers: HeaderMap) -> Response {
    let session = state.session_from_cookies(&headers);
    let ctx = NavigationContext::new(&session);

    let navigation = state
        .routes
        .navigate(state.guard.as_ref(), &ctx, DASHBOARD_PATH);
    match navigation {
        Navigation::Entered(_) => {
            let user = session.user();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                serde_json::json!({
                    "view": "dashboard",
                    "user": user,
                })
                .to_string(),
            )
                .into_response()
        }
        Navigation::Blocked {
            redirect_to: Some(_),
        } => {
            let here = ReturnDestination::parse(Some(DASHBOARD_PATH)).ok();
            state.login_redirect(here.as_ref())
        }
        Navigation::Blocked { redirect_to: None } => StatusCode::UNAUTHORIZED.into_response(),
        Navigation::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}
