//! REST API for the bizquery web client.
//!
//! Routes live in [`handlers`]; this module owns shared state, the
//! middleware stack, and the serve loop.

pub mod handlers;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use bizquery_core::AskPipeline;
use bizquery_types::ErrorKind;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::rate_limiter::RateLimiter;

/// Body returned when a handler panics.
pub const INTERNAL_ERROR_MESSAGE: &str = "Something broke internally.";

/// Shared state accessible by all API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// The question-to-answer pipeline.
    pub pipeline: Arc<AskPipeline>,
    /// Per-client limiter for the ask endpoint.
    pub limiter: Arc<RateLimiter>,
}

impl ApiState {
    pub fn new(pipeline: AskPipeline, limiter: RateLimiter) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limiter: Arc::new(limiter),
        }
    }
}

/// Build the API router with all routes and middleware.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`, as
/// [`serve`] does. Without connect info every caller is rate limited under
/// the single key `"unknown"`, so one client can lock out all others.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    with_middleware(handlers::routes(), cors_origins).with_state(state)
}

fn with_middleware<S>(router: Router<S>, cors_origins: &[String]) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(AllowHeaders::any())
    };

    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    error!(panic = detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": INTERNAL_ERROR_MESSAGE,
            "kind": ErrorKind::Internal,
        })),
    )
        .into_response()
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
///
/// Client addresses are attached to each request for rate limiting.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    handlers::mark_started();
    info!(%addr, "listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use axum::routing::get;
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn panic_becomes_internal_error() {
        let app = with_middleware(Router::new().route("/boom", get(boom)), &[]);
        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], json!(false));
        assert_eq!(json["error"], json!("Something broke internally."));
        assert_eq!(json["kind"], json!("Internal"));
    }

    #[tokio::test]
    async fn router_keeps_serving_after_panic() {
        let app = with_middleware(
            Router::new()
                .route("/boom", get(boom))
                .route("/ok", get(|| async { "fine" })),
            &[],
        );
        let first = app
            .clone()
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let second = app
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let origins = vec!["https://bizquery-ai.vercel.app".to_string()];
        let app = with_middleware(Router::new().route("/ok", get(|| async { "fine" })), &origins);

        let preflight = |origin: &str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/ok")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app
            .clone()
            .oneshot(preflight("https://bizquery-ai.vercel.app"))
            .await
            .unwrap();
        assert_eq!(
            allowed
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://bizquery-ai.vercel.app"
        );

        let denied = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(
            denied
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
