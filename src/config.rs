//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values built into the code
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_UPSTREAM_MODEL, ...)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! Deployment-platform special cases `HOST` and `PORT` override the server
//! binding, and `GOOGLE_API_KEY` supplies the upstream credential the same
//! way the original deployment did.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub audio: AudioSettings,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream voice-service connection settings.
///
/// Endpoint, model id and credential are opaque strings; the relay never
/// interprets them beyond assembling the connection URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// WebSocket base URL of the voice service
    pub url: String,

    /// Model identifier sent in session negotiation
    pub model: String,

    /// API key appended to the connection URL; supplied via GOOGLE_API_KEY
    #[serde(default)]
    pub api_key: String,

    /// Path of the system-prompt text file sent as session instructions
    pub system_prompt_path: String,
}

impl UpstreamConfig {
    /// Full connection URL with the credential attached.
    pub fn endpoint(&self) -> String {
        format!("{}?key={}", self.url, self.api_key)
    }
}

/// Audio pipeline settings.
///
/// The transport rate is what capture emits and the relay forwards upstream;
/// the response rate is assumed for inbound audio until a chunk declares its
/// own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Sample rate of audio sent upstream (Hz)
    pub transport_sample_rate: u32,

    /// Default sample rate of response audio (Hz)
    pub response_sample_rate: u32,
}

/// Performance tuning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrent relay sessions
    pub max_concurrent_sessions: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            upstream: UpstreamConfig {
                url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService/BidiGenerateContent".to_string(),
                model: "gemini-2.5-flash-preview-native-audio-dialog".to_string(),
                api_key: String::new(),
                system_prompt_path: "system_prompt.txt".to_string(),
            },
            audio: AudioSettings {
                transport_sample_rate: 16000,   // what the upstream ingests
                response_sample_rate: 24000,    // documented upstream default
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment-platform conventions that don't follow the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }
        if let Ok(key) = env::var("GOOGLE_API_KEY") {
            settings = settings.set_override("upstream.api_key", key)?;
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            settings = settings.set_override("upstream.model", model)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// The API key is deliberately not checked here so a default config
    /// validates in tests; `main` refuses to start without one.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.upstream.url.is_empty() {
            return Err(anyhow::anyhow!("Upstream URL cannot be empty"));
        }

        if self.upstream.model.is_empty() {
            return Err(anyhow::anyhow!("Upstream model cannot be empty"));
        }

        if self.audio.transport_sample_rate == 0 || self.audio.response_sample_rate == 0 {
            return Err(anyhow::anyhow!("Sample rates must be greater than 0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (runtime config endpoint).
    ///
    /// Only the fields present in the JSON are updated; the credential is not
    /// updatable at runtime.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(upstream) = partial.get("upstream") {
            if let Some(url) = upstream.get("url").and_then(|v| v.as_str()) {
                self.upstream.url = url.to_string();
            }
            if let Some(model) = upstream.get("model").and_then(|v| v.as_str()) {
                self.upstream.model = model.to_string();
            }
            if let Some(path) = upstream.get("system_prompt_path").and_then(|v| v.as_str()) {
                self.upstream.system_prompt_path = path.to_string();
            }
        }

        if let Some(audio) = partial.get("audio") {
            if let Some(rate) = audio.get("transport_sample_rate").and_then(|v| v.as_u64()) {
                self.audio.transport_sample_rate = rate as u32;
            }
            if let Some(rate) = audio.get("response_sample_rate").and_then(|v| v.as_u64()) {
                self.audio.response_sample_rate = rate as u32;
            }
        }

        if let Some(performance) = partial.get("performance") {
            if let Some(sessions) = performance
                .get("max_concurrent_sessions")
                .and_then(|v| v.as_u64())
            {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}
