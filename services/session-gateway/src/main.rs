//! Session Gateway
//!
//! Single-binary Rust service that:
//! 1. Issues signed bearer tokens for accepted credentials
//! 2. Runs the delegated login round trip with an external OAuth provider
//! 3. Keeps the resulting sign-in in a `session` cookie
//! 4. Gates protected pages on that session

mod account;
mod config;
mod error;
mod metrics;
mod token;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bearer_token::{AllowList, Signer, TokenIssuer};
use delegated_login::{OAuthRedirector, ProviderClient};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::account::{AccountState, build_account_router};
use crate::config::Config;
use crate::metrics::ServiceStats;
use crate::token::{TokenState, build_token_router};

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for calls to the provider's token and user-info endpoints.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    token: TokenState,
    account: AccountState,
    stats: ServiceStats,
    prometheus: PrometheusHandle,
}

/// Wire issuer, redirector and provider client from a loaded config.
///
/// Fails with `ConfigurationMissing` when a secret or the provider app
/// credentials are absent, before anything is bound.
fn build_state(
    config: &Config,
    http_client: reqwest::Client,
    prometheus: PrometheusHandle,
) -> error::Result<AppState> {
    let signer = Arc::new(Signer::new(config.signing_secret()?)?);
    let issuer = Arc::new(TokenIssuer::new(
        AllowList::new(config.token.accepted_users.iter().cloned()),
        signer.clone(),
        config.issuer_settings(),
    ));

    // Cookie sessions are minted for provider identities only; the
    // allow-list never applies to them.
    let session_issuer = Arc::new(TokenIssuer::new(
        AllowList::default(),
        signer.clone(),
        config.session_issuer_settings(),
    ));

    let provider_config = config.provider_config()?;
    let redirector = Arc::new(OAuthRedirector::new(provider_config.clone(), signer)?);
    let provider = ProviderClient::new(http_client, provider_config);

    let stats = ServiceStats::new();
    Ok(AppState {
        token: TokenState::new(issuer, stats.clone()),
        account: AccountState::new(
            redirector,
            provider,
            session_issuer,
            &config.server.public_base_url,
            &config.oauth.login_path,
            stats.clone(),
        ),
        stats,
        prometheus,
    })
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let token_router = build_token_router(state.token.clone());
    let account_router = build_account_router(state.account.clone());

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(token_router)
        .merge(account_router)
        .layer(axum::middleware::from_fn(metrics::track_duration))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting session-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder().context("failed to install metrics")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        public_base_url = %config.server.public_base_url,
        callback_url = %config.callback_url(),
        accepted_users = config.token.accepted_users.len(),
        "configuration loaded"
    );

    let http_client = reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let app_state =
        build_state(&config, http_client, prometheus_handle).context("failed to start gateway")?;
    let stats = app_state.stats.clone();
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires: the server is
    // told to drain, then the drain is raced against DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!(
        tokens_issued = stats.tokens_issued.load(Ordering::Relaxed),
        logins_completed = stats.logins_completed.load(Ordering::Relaxed),
        "shutdown complete"
    );
    Ok(())
}

/// Health endpoint: status, uptime and issuance/login counters.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.stats.started_at.elapsed().as_secs(),
        "tokens_issued": state.stats.tokens_issued.load(Ordering::Relaxed),
        "logins_completed": state.stats.logins_completed.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
