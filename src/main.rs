//! # Voice Relay Backend - Entry Point
//!
//! Boots the Actix-web server that hosts the relay:
//! 1. Loads and validates configuration (config.toml + environment)
//! 2. Refuses to start without an upstream API key
//! 3. Reads the system prompt file used in upstream session negotiation
//! 4. Serves `/ws` (the relay), `/health` and the `/api/v1` endpoints
//! 5. Shuts down gracefully on SIGTERM/SIGINT

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_relay_backend::config::AppConfig;
use voice_relay_backend::state::AppState;
use voice_relay_backend::{handlers, health, middleware, websocket};

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-relay-backend v{}", env!("CARGO_PKG_VERSION"));

    // The relay is useless without an upstream credential; fail fast with a
    // hint rather than erroring on the first connection.
    if config.upstream.api_key.is_empty() {
        anyhow::bail!(
            "GOOGLE_API_KEY is not set. Add it to the environment or a .env file \
             before starting the relay."
        );
    }

    let system_prompt = match std::fs::read_to_string(&config.upstream.system_prompt_path) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                path = %config.upstream.system_prompt_path,
                error = %e,
                "system prompt file not readable, sessions will use empty instructions"
            );
            String::new()
        }
    };

    let app_state = AppState::new(config.clone(), system_prompt);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!(model = %config.upstream.model, "Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::config::get_config))
                    .route("/config", web::put().to(handlers::config::update_config)),
            )
            .route("/health", web::get().to(health::health_check))
            .route("/ws", web::get().to(websocket::relay_websocket))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging via tracing; RUST_LOG overrides the default filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_relay_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// SIGTERM/SIGINT set the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
