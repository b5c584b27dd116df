//! Reef Quiz · Educational Mini-Game Backend
//!
//! - Challenge lifecycle core (mystery boxes, questions, score and lives)
//! - Axum HTTP + WebSocket host: one game per connection
//! - Static client fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   GAME_CONFIG_PATH  : path to TOML config (pacing, scoring, layout, question bank)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod error;
mod domain;
mod config;
mod seeds;
mod bank;
mod registry;
mod progress;
mod bus;
mod presenter;
mod lifecycle;
mod scene;
mod game;
mod state;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::load_game_config_from_env;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    // Invalid settings or an unusable question bank stop us before any session starts.
    let state = Arc::new(AppState::new(load_game_config_from_env())?);

    let app = build_router(state.clone());

    // Read port from env or default to 3000.
    let addr: SocketAddr = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = TcpListener::bind(addr).await?;
    info!(target: "reef_quiz", %addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "reef_quiz", error = %e, "Failed to listen for shutdown signal");
    }
    info!(target: "reef_quiz", "Shutdown requested");
}
