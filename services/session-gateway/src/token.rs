//! Bearer token API
//!
//! Endpoints:
//! - POST /api/user/login: JSON string credential in, `{ user, token }` out
//! - GET /api/user/me: echo the claims of a presented bearer token

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bearer_token::{ClaimType, Credential, TokenIssuer};
use tracing::{error, warn};

use crate::metrics::{self, ServiceStats};

/// Shared state for token handlers.
#[derive(Clone)]
pub struct TokenState {
    issuer: Arc<TokenIssuer>,
    stats: ServiceStats,
}

impl TokenState {
    pub fn new(issuer: Arc<TokenIssuer>, stats: ServiceStats) -> Self {
        Self { issuer, stats }
    }
}

pub fn build_token_router(state: TokenState) -> Router {
    Router::new()
        .route("/api/user/login", post(login))
        .route("/api/user/me", get(me))
        .with_state(state)
}

fn invalid_user() -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Invalid User",
    )
        .into_response()
}

/// Error body for failures that are the gateway's fault, never the caller's.
pub fn server_error(message: &str) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    error!(request_id, reason = message, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "error": {
                "type": "server_error",
                "message": message,
                "request_id": request_id,
            }
        })
        .to_string(),
    )
        .into_response()
}

/// POST /api/user/login: verify the credential and issue a token.
///
/// A body that is not a JSON string is treated like an unknown user.
async fn login(State(state): State<TokenState>, body: Bytes) -> Response {
    let Ok(credential) = serde_json::from_slice::<Credential>(&body) else {
        warn!("login body is not a JSON string credential");
        metrics::record_issuance("rejected");
        return invalid_user();
    };

    match state.issuer.issue(&credential) {
        Ok(issued) => {
            let body = match serde_json::to_string(&issued) {
                Ok(body) => body,
                Err(e) => {
                    metrics::record_issuance("error");
                    return server_error(&format!("cannot encode token response: {e}"));
                }
            };
            metrics::record_issuance("issued");
            state.stats.token_issued();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(bearer_token::Error::InvalidCredential) => {
            warn!("login rejected");
            metrics::record_issuance("rejected");
            invalid_user()
        }
        Err(e) => {
            metrics::record_issuance("error");
            server_error(&format!("token issuance failed: {e}"))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        "",
    )
        .into_response()
}

/// GET /api/user/me: claims of a valid, unexpired token.
async fn me(State(state): State<TokenState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };

    match state.issuer.validate(token) {
        Ok(payload) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::json!({
                "name": payload.claims.get(ClaimType::Name),
                "role": payload.claims.get(ClaimType::Role),
                "iss": payload.iss,
                "aud": payload.aud,
                "exp": payload.exp,
            })
            .to_string(),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "bearer token refused");
            unauthorized()
        }
    }
}
