//! MotherDuck Token Service
//!
//! Single-binary Rust service that:
//! 1. Serves `GET /api/md-token?read_scaling=..` to browser clients
//! 2. Mints short-lived read-only tokens when read-scaling is requested
//! 3. Falls back to a static token when minting is disabled or fails
//! 4. Never hands out a token that is not three dot-separated segments

mod broker;
mod config;
mod error;
mod metrics;
mod sources;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use motherduck_auth::{Credential, MintClient, TOKEN_ENDPOINT_PATH};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::broker::{Broker, Outcome, TokenRequest};
use crate::config::Config;
use crate::sources::{CredentialSource, ReadScalingSource, StaticSource};

/// Maximum time to wait for in-flight requests after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Message returned when no source produced a valid credential. Carries no
/// token or secret material.
const UNAVAILABLE_MESSAGE: &str = "no valid MotherDuck token available";

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    broker: Arc<Broker>,
    requests_total: Arc<AtomicU64>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Success body of the token endpoint
#[derive(Serialize)]
struct TokenBody<'a> {
    #[serde(rename = "mdToken")]
    md_token: &'a Credential,
    expire_at: &'a str,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route(TOKEN_ENDPOINT_PATH, get(md_token_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Wire the configured sources into a broker.
///
/// Without an admin token there is nothing to mint with, so the read-scaling
/// source is left out and such requests go straight to the fallback.
fn build_broker(config: &Config, http: reqwest::Client) -> Broker {
    let md = &config.motherduck;

    let read_scaling = md.admin_token.clone().map(|admin_token| {
        let client = MintClient::new(
            http,
            md.api_base_url.clone(),
            md.account_name.clone(),
            admin_token,
            Duration::from_secs(md.timeout_secs),
        );
        Arc::new(ReadScalingSource::new(client, md.token_ttl_secs)) as Arc<dyn CredentialSource>
    });
    let fallback: Arc<dyn CredentialSource> = Arc::new(StaticSource::new(md.fallback_token.clone()));

    Broker::new(config.server.mode, read_scaling, fallback)
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

    info!("starting md-token-service");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

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

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let broker = Arc::new(build_broker(&config, http));

    info!(
        listen_addr = %config.server.listen_addr,
        mode = %config.server.mode,
        api_base_url = %config.motherduck.api_base_url,
        account = %config.motherduck.account_name,
        read_scaling = broker.read_scaling_enabled(),
        fallback_configured = broker.fallback_configured(),
        "configuration loaded"
    );
    if !broker.fallback_configured() {
        warn!("no fallback token configured; non-read-scaling requests will fail");
    }

    let app_state = AppState {
        broker,
        requests_total: Arc::new(AtomicU64::new(0)),
        started_at: Instant::now(),
        prometheus: prometheus_handle,
    };
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts at signal receipt, not at server start
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
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Token endpoint. Responds 200 `{mdToken, expire_at}` or 500 `{error}`,
/// always with `cache-control: no-store`.
///
/// Only the literal value `read_scaling=true` requests a minted token.
async fn md_token_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    let request = TokenRequest {
        read_scaling: params.get("read_scaling").map(String::as_str) == Some("true"),
    };
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!(
        "md_token",
        request_id = %request_id,
        read_scaling = request.read_scaling,
        issued_source = tracing::field::Empty,
        failed_sources = tracing::field::Empty,
    );

    let outcome = state.broker.issue(request).instrument(span.clone()).await;
    record_outcome(&span, &outcome);
    let response = token_response(&outcome);

    metrics::record_request(response.status().as_u16(), started.elapsed().as_secs_f64());
    response
}

/// Attach the broker's per-source diagnostics to the request span and log
/// one summary line per request.
fn record_outcome(span: &tracing::Span, outcome: &Outcome) {
    let failed_sources = outcome.failed_sources();
    if !failed_sources.is_empty() {
        span.record("failed_sources", failed_sources.as_str());
    }
    span.in_scope(|| match outcome.issued_source() {
        Some(source) => {
            span.record("issued_source", source);
            info!(
                issued_source = source,
                failed_sources = %failed_sources,
                "token request served"
            );
        }
        None => error!(failed_sources = %failed_sources, "token request failed"),
    });
}

fn token_response(outcome: &Outcome) -> Response {
    let mut response = match outcome {
        Outcome::Issued { token, .. } => axum::Json(TokenBody {
            md_token: &token.token,
            expire_at: &token.expire_at,
        })
        .into_response(),
        Outcome::Unavailable { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(serde_json::json!({ "error": UNAVAILABLE_MESSAGE })),
        )
            .into_response(),
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Health endpoint: 200 when a fallback token is configured, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let broker = &state.broker;
    let fallback_configured = broker.fallback_configured();
    let status_code = if fallback_configured {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let status = if fallback_configured { "healthy" } else { "degraded" };
    let scoped_minting = if broker.read_scaling_enabled() {
        "enabled"
    } else {
        "disabled"
    };

    let body = serde_json::json!({
        "status": status,
        "mode": broker.mode().to_string(),
        "scoped_minting": scoped_minting,
        "fallback_configured": fallback_configured,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "requests_served": state.requests_total.load(Ordering::Relaxed),
    });

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
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
