//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use rusqlite::Connection;
use serde_json::{Value, json};
use tower::ServiceExt;

use bizquery_core::{AskPipeline, QueryExecutor, ReadOnlyDatabase};
use bizquery_llm::{ChatRequest, ChatResponse, CompletionClient, Provider, ProviderError, RetryConfig};
use bizquery_services::{ApiState, RateLimiter, build_router};

#[derive(Clone, Copy)]
enum Reply {
    Content(&'static str),
    Overloaded,
}

struct FixedProvider {
    reply: Reply,
    calls: AtomicU32,
}

#[async_trait]
impl Provider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, request: &ChatRequest) -> bizquery_llm::Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Content(content) => Ok(ChatResponse::from_content(&request.model, content)),
            Reply::Overloaded => Err(ProviderError::Overloaded("HTTP 503".into())),
        }
    }
}

struct Harness {
    app: Router,
    provider: Arc<FixedProvider>,
}

fn harness(reply: Reply, limiter: RateLimiter) -> Harness {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE sales (id INTEGER PRIMARY KEY, region TEXT, xx23 REAL, date TEXT);
         INSERT INTO sales (region, xx23, date) VALUES ('North', 10, '2024-01-01');
         INSERT INTO sales (region, xx23, date) VALUES ('South', 30, '2024-01-02');",
    )
    .unwrap();
    let db = ReadOnlyDatabase::from_connection(conn).unwrap();

    let provider = Arc::new(FixedProvider {
        reply,
        calls: AtomicU32::new(0),
    });
    let dyn_provider: Arc<dyn Provider> = provider.clone();
    let completion = CompletionClient::new(dyn_provider, "openai/gpt-3.5-turbo").with_retry(RetryConfig {
        max_attempts: 3,
        delay: Duration::from_millis(1),
    });
    let pipeline = AskPipeline::new(completion, QueryExecutor::new(Arc::new(db)));
    let app = build_router(ApiState::new(pipeline, limiter), &[]);
    Harness { app, provider }
}

fn unlimited() -> RateLimiter {
    RateLimiter::new(3, 0)
}

fn ask_request(body: &str, ip: [u8; 4]) -> Request<Body> {
    let mut request = Request::post("/api/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

const TOTALS: &str = r#"{"sql": "SELECT region, SUM(xx23) AS total FROM sales GROUP BY region ORDER BY total DESC", "explanation": "Totals per region."}"#;

#[tokio::test]
async fn ask_returns_rows() {
    let h = harness(Reply::Content(TOTALS), unlimited());
    let (status, body) = send(
        &h.app,
        ask_request(r#"{"question": "Which region sells most?"}"#, [127, 0, 0, 1]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["sql"],
        json!("SELECT region, SUM(xx23) AS total FROM sales WHERE date GLOB '????-??-??' GROUP BY region ORDER BY total DESC")
    );
    assert_eq!(body["explanation"], json!("Totals per region."));
    assert_eq!(
        body["rows"],
        json!([{"region": "South", "total": 30.0}, {"region": "North", "total": 10.0}])
    );
}

#[tokio::test]
async fn malformed_body_is_input_error() {
    let h = harness(Reply::Content(TOTALS), unlimited());
    let (status, body) = send(&h.app, ask_request("{not json", [127, 0, 0, 1])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["kind"], json!("InputError"));
    assert_eq!(body["error"], json!("Invalid or too long question."));
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_or_oversized_question_is_input_error() {
    let h = harness(Reply::Content(TOTALS), unlimited());
    let long = json!({"question": "q".repeat(301)}).to_string();
    for body in [r#"{}"#, r#"{"question": 42}"#, long.as_str()] {
        let (status, json) = send(&h.app, ask_request(body, [127, 0, 0, 1])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["kind"], json!("InputError"));
    }
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn overload_maps_to_503() {
    let h = harness(Reply::Overloaded, unlimited());
    let (status, body) = send(
        &h.app,
        ask_request(r#"{"question": "total sales"}"#, [127, 0, 0, 1]),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["error"],
        json!("Oops! Our AI is a bit overwhelmed right now. Please try again in a moment.")
    );
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn policy_violation_maps_to_400() {
    let h = harness(
        Reply::Content(r#"{"sql": "DROP TABLE sales", "explanation": "Drops it."}"#),
        unlimited(),
    );
    let (status, body) = send(
        &h.app,
        ask_request(r#"{"question": "remove sales"}"#, [127, 0, 0, 1]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], json!("PolicyError"));
    assert_eq!(body["error"], json!("Only SELECT queries are allowed."));
    assert_eq!(body["details"]["sql"], json!("DROP TABLE sales"));
}

#[tokio::test]
async fn second_request_in_window_is_rate_limited() {
    let h = harness(Reply::Content(TOTALS), RateLimiter::new(3, 1));
    let body = r#"{"question": "total sales"}"#;

    let (first, _) = send(&h.app, ask_request(body, [10, 0, 0, 1])).await;
    assert_eq!(first, StatusCode::OK);

    let (second, json) = send(&h.app, ask_request(body, [10, 0, 0, 1])).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["success"], json!(false));
    assert_eq!(
        json["error"],
        json!("Too many requests – please slow down a bit. Try again in a few seconds.")
    );

    let (other_client, _) = send(&h.app, ask_request(body, [10, 0, 0, 2])).await;
    assert_eq!(other_client, StatusCode::OK);
    assert_eq!(h.provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn requests_without_connect_info_share_one_bucket() {
    let h = harness(Reply::Content(TOTALS), RateLimiter::new(3, 1));
    let bare = || {
        Request::post("/api/ask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"question": "total sales"}"#))
            .unwrap()
    };

    let (first, _) = send(&h.app, bare()).await;
    assert_eq!(first, StatusCode::OK);
    let (second, _) = send(&h.app, bare()).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);

    // A caller with a socket address has its own bucket.
    let (addressed, _) = send(
        &h.app,
        ask_request(r#"{"question": "total sales"}"#, [10, 0, 0, 9]),
    )
    .await;
    assert_eq!(addressed, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_version() {
    let h = harness(Reply::Content(TOTALS), unlimited());
    let (status, body) = send(
        &h.app,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
    assert!(body["uptime_secs"].is_u64());
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let h = harness(Reply::Content(TOTALS), RateLimiter::new(3, 1));
    for _ in 0..3 {
        let (status, _) = send(
            &h.app,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
