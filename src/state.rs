//! # Application State Management
//!
//! Shared state accessed by the HTTP handlers, the middleware and every relay
//! session: the runtime-updatable configuration, the relay metrics, the
//! system prompt and the server start time.
//!
//! All mutable pieces use the Arc<RwLock<T>> pattern — many readers or one
//! writer — so request handlers and connection actors can share them without
//! data races. Locks are held only for the duration of a field copy; nothing
//! network- or audio-facing ever runs under one.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Shared application state handed to every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (runtime-updatable)
    pub config: Arc<RwLock<AppConfig>>,

    /// Relay and HTTP metrics
    pub metrics: Arc<RwLock<RelayMetrics>>,

    /// System prompt sent as instructions in upstream session negotiation
    pub system_prompt: Arc<String>,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across HTTP requests and relay sessions.
#[derive(Debug, Default, Clone)]
pub struct RelayMetrics {
    /// Total HTTP requests processed since start
    pub request_count: u64,

    /// Total HTTP errors since start
    pub error_count: u64,

    /// Currently connected relay sessions
    pub active_sessions: u32,

    /// Relay sessions opened since start
    pub sessions_opened: u64,

    /// Audio chunks forwarded to the upstream service
    pub chunks_forwarded: u64,

    /// Responses that completed naturally
    pub responses_completed: u64,

    /// Responses cancelled by user barge-in or upstream interruption
    pub responses_interrupted: u64,

    /// Per-endpoint HTTP statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a specific HTTP endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl AppState {
    /// Create fresh state from the loaded configuration and system prompt.
    pub fn new(config: AppConfig, system_prompt: String) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(RelayMetrics::default())),
            system_prompt: Arc::new(system_prompt),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;
        *self.config.write().unwrap() = new_config;
        Ok(())
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    /// Record one finished HTTP request against its endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let entry = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();
        entry.request_count += 1;
        entry.total_duration_ms += duration_ms;
        if is_error {
            entry.error_count += 1;
        }
    }

    /// A relay session connected.
    pub fn session_opened(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions += 1;
        metrics.sessions_opened += 1;
    }

    /// A relay session disconnected.
    pub fn session_closed(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions = metrics.active_sessions.saturating_sub(1);
    }

    pub fn record_chunk_forwarded(&self) {
        self.metrics.write().unwrap().chunks_forwarded += 1;
    }

    pub fn record_response_completed(&self) {
        self.metrics.write().unwrap().responses_completed += 1;
    }

    pub fn record_response_interrupted(&self) {
        self.metrics.write().unwrap().responses_interrupted += 1;
    }

    /// Get a point-in-time copy of the metrics.
    pub fn get_metrics_snapshot(&self) -> RelayMetrics {
        self.metrics.read().unwrap().clone()
    }

    /// Seconds since the server started.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new(AppConfig::default(), "prompt".to_string())
    }

    #[test]
    fn test_session_counters() {
        let state = test_state();
        state.session_opened();
        state.session_opened();
        state.session_closed();

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.active_sessions, 1);
        assert_eq!(metrics.sessions_opened, 2);

        // Never underflows.
        state.session_closed();
        state.session_closed();
        assert_eq!(state.get_metrics_snapshot().active_sessions, 0);
    }

    #[test]
    fn test_relay_counters() {
        let state = test_state();
        state.record_chunk_forwarded();
        state.record_chunk_forwarded();
        state.record_response_completed();
        state.record_response_interrupted();

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.chunks_forwarded, 2);
        assert_eq!(metrics.responses_completed, 1);
        assert_eq!(metrics.responses_interrupted, 1);
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = test_state();
        state.record_endpoint_request("GET /health", 5, false);
        state.record_endpoint_request("GET /health", 15, true);

        let metrics = state.get_metrics_snapshot();
        let endpoint = &metrics.endpoint_metrics["GET /health"];
        assert_eq!(endpoint.request_count, 2);
        assert_eq!(endpoint.error_count, 1);
        assert!((endpoint.average_duration_ms() - 10.0).abs() < f64::EPSILON);
        assert!((endpoint.error_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_update_rejects_invalid() {
        let state = test_state();
        let mut bad = state.get_config();
        bad.server.port = 0;
        assert!(state.update_config(bad).is_err());
        // Original config untouched.
        assert_eq!(state.get_config().server.port, 8080);
    }
}
