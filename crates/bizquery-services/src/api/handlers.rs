//! HTTP request handlers for the REST API.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Once, OnceLock};
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bizquery_core::AskError;
use bizquery_core::assemble::assemble;
use bizquery_types::{AskRequest, AskResult, ErrorKind};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ApiState;

/// Body message for requests rejected by the rate limiter.
pub const RATE_LIMITED_MESSAGE: &str =
    "Too many requests – please slow down a bit. Try again in a few seconds.";

/// Build all routes.
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/ask", post(ask))
        .route("/health", get(health_check))
}

// ── Client address ───────────────────────────────────────────────────────

/// Rate-limit key for the calling client: its socket IP, or `"unknown"`
/// when the server was not started with connect info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

static MISSING_CONNECT_INFO: Once = Once::new();

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| {
                MISSING_CONNECT_INFO.call_once(|| {
                    warn!("request has no connect info; all clients share one rate-limit bucket")
                });
                "unknown".into()
            });
        Ok(Self(addr))
    }
}

// ── Ask ──────────────────────────────────────────────────────────────────

/// `POST /api/ask`.
///
/// The pipeline runs under a cancellation token whose drop guard lives in
/// this future, so a client that disconnects cancels the in-flight
/// completion call and any running statement.
async fn ask(
    State(state): State<ApiState>,
    client: ClientAddr,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Response {
    if !state.limiter.check(&client.0) {
        warn!(client = %client.0, "rate limited");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": RATE_LIMITED_MESSAGE,
                "kind": ErrorKind::RateLimited,
            })),
        )
            .into_response();
    }

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(client = %client.0, error = %rejection.body_text(), "unreadable ask body");
            let expose = state.pipeline.options().expose_diagnostics;
            return respond(assemble(Err(AskError::Input), expose));
        }
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let result = state.pipeline.ask_with_cancel(&request, cancel).await;
    guard.disarm();

    debug!(client = %client.0, success = result.is_success(), "ask finished");
    respond(result)
}

fn respond(result: AskResult) -> Response {
    let status =
        StatusCode::from_u16(result.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(result.into_response())).into_response()
}

// ── Health ───────────────────────────────────────────────────────────────

/// Server start time, set once at first use.
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Record the start time. Called by the server at boot so uptime counts
/// from launch rather than from the first health probe.
pub fn mark_started() {
    START_TIME.get_or_init(Instant::now);
}

/// Returns basic health status, version, and uptime.
async fn health_check() -> Json<serde_json::Value> {
    let start = START_TIME.get_or_init(Instant::now);
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": start.elapsed().as_secs(),
    }))
}
