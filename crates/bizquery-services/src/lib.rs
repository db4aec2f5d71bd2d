//! HTTP surface for bizquery.
//!
//! Exposes the ask pipeline over axum: `POST /api/ask`, `GET /health`,
//! CORS, a per-client sliding-window rate limit, and a panic boundary.
//! All question handling lives in `bizquery-core`; this crate only maps
//! HTTP in and out.

pub mod api;
pub mod rate_limiter;

pub use api::{ApiState, build_router, serve};
pub use rate_limiter::RateLimiter;
