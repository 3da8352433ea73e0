//! # HTTP Middleware
//!
//! Cross-cutting concerns for the HTTP surface (health, metrics, config and
//! the WebSocket upgrade itself):
//! - `logging`: structured request/response logging with latency
//! - `metrics`: per-endpoint counters fed into [`crate::state::AppState`]

pub mod logging;
pub mod metrics;

pub use logging::RequestLogging;
pub use metrics::MetricsMiddleware;
