//! # Error Handling
//!
//! This module defines the error taxonomy for the relay and how errors are
//! converted to HTTP responses.
//!
//! ## Error Categories:
//! - **Transport**: connection-level failures on either WebSocket boundary;
//!   surfaced to the local client as an `error` event, never crash the relay
//! - **Protocol**: malformed or undecodable messages; logged, surfaced as an
//!   `error` event, the offending message is dropped and the session continues
//! - **Decode**: invalid transport-encoded audio payload; the chunk is dropped
//!   with no session-level effect
//! - **Negotiation**: the upstream session-create was never acknowledged;
//!   fatal for that relay instance, the local connection is closed
//! - **Config / Validation / Internal**: server-side problems on the HTTP
//!   surface (configuration endpoints, startup)

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Error type covering both the relay's audio/protocol failures and the
/// HTTP surface.
#[derive(Debug)]
pub enum RelayError {
    /// Connection-level failure on the client or upstream WebSocket
    Transport(String),

    /// Malformed or undecodable protocol message
    Protocol(String),

    /// Invalid transport-encoded audio payload
    Decode(String),

    /// Upstream session negotiation failed or was never acknowledged
    Negotiation(String),

    /// Configuration file or environment variable problems
    Config(String),

    /// User input failed validation rules
    Validation(String),

    /// Internal server errors
    Internal(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RelayError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            RelayError::Decode(msg) => write!(f, "Decode error: {}", msg),
            RelayError::Negotiation(msg) => write!(f, "Negotiation error: {}", msg),
            RelayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RelayError::Validation(msg) => write!(f, "Validation error: {}", msg),
            RelayError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

/// Conversion of errors into JSON HTTP responses for the REST endpoints.
///
/// The relay's own failure paths (Transport/Protocol/Decode/Negotiation)
/// normally travel as WebSocket `error` events instead; the HTTP mapping
/// exists for the config/health endpoints and the upgrade handler.
impl ResponseError for RelayError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            RelayError::Transport(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "transport_error",
                msg.clone(),
            ),
            RelayError::Protocol(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "protocol_error",
                msg.clone(),
            ),
            RelayError::Decode(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "decode_error",
                msg.clone(),
            ),
            RelayError::Negotiation(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,
                "negotiation_error",
                msg.clone(),
            ),
            RelayError::Config(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            RelayError::Validation(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            RelayError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Protocol(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}

/// Shorthand for `Result<T, RelayError>`.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = RelayError::Decode("bad payload".to_string());
        assert_eq!(err.to_string(), "Decode error: bad payload");

        let err = RelayError::Negotiation("no session.created".to_string());
        assert!(err.to_string().starts_with("Negotiation error"));
    }

    #[test]
    fn test_json_error_maps_to_protocol() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let relay_err: RelayError = parse_err.into();
        assert!(matches!(relay_err, RelayError::Protocol(_)));
    }
}
