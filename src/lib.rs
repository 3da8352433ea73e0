//! # Voice Relay Backend
//!
//! Push-to-talk voice relay between browser-style clients and an upstream
//! realtime voice service. The server accepts WebSocket connections on `/ws`,
//! bridges each one to its own upstream session, and mediates the
//! listen → process → speak turn cycle including user barge-in.
//!
//! ## Architecture:
//! - **audio**: capture/playback pipelines, resampling and PCM transport codec
//! - **engine**: headless client-side glue for embedders and integration tests
//! - **protocol**: the downstream and upstream wire message types
//! - **relay**: the per-session state machine, pure and synchronous
//! - **upstream**: the WebSocket client for the upstream voice service
//! - **websocket**: the actix actor binding all of the above to one connection
//! - **config / state / health / handlers / middleware / error**: the server
//!   scaffolding around the relay

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod upstream;
pub mod websocket;
