//! # HTTP API Handlers
//!
//! REST endpoints under `/api/v1`. The relay itself lives on `/ws`; these
//! handlers cover runtime configuration inspection and updates.

pub mod config;
