//! Wayfinder · Branching Course Chat Backend
//!
//! - Axum HTTP + WebSocket API (one WebSocket = one conversation session)
//! - Optional OpenAI free-text evaluator (via environment variables)
//! - Static chat UI fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   CONTENT_PATH         : TOML course file (default: built-in demo course)
//!   OPENAI_API_KEY       : enables OpenAI evaluation/translation if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL    : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL  : default "gpt-4o"
//!   AGENT_CONFIG_PATH    : path to TOML config (prompts, timing, analytics)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod i18n;
mod config;
mod content;
mod seeds;
mod session;
mod branches;
mod scoring;
mod engine;
mod state;
mod protocol;
mod logic;
mod openai;
mod analytics;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Course, prompts, pacing and the optional OpenAI client.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "wayfinder_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "wayfinder_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "wayfinder_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "wayfinder_backend", "Shutdown signal received");
}
