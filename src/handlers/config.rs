//! Runtime configuration endpoints.
//!
//! GET returns the active configuration with the upstream credential
//! redacted; PUT applies a partial JSON update (the credential is not
//! updatable at runtime). Changes affect sessions opened afterwards —
//! already-connected sessions keep the configuration they started with.

use crate::{config::AppConfig, error::RelayError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_view(config: &AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "upstream": {
            "url": config.upstream.url,
            "model": config.upstream.model,
            "api_key_set": !config.upstream.api_key.is_empty(),
            "system_prompt_path": config.upstream.system_prompt_path
        },
        "audio": {
            "transport_sample_rate": config.audio.transport_sample_rate,
            "response_sample_rate": config.audio.response_sample_rate
        },
        "performance": {
            "max_concurrent_sessions": config.performance.max_concurrent_sessions
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, RelayError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_view(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, RelayError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut config = state.get_config();
    config
        .update_from_json(&json_str)
        .map_err(|e| RelayError::Validation(e.to_string()))?;

    state
        .update_config(config.clone())
        .map_err(RelayError::Validation)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated, applies to new sessions",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_view(&config)
    })))
}
