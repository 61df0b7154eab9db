//! `GET /health`: a liveness probe only — it never touches
//! the database, fingerprint index, or vector store, so a slow dependency
//! cannot make the process look dead to an orchestrator.

use crate::AppState;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

pub fn routes() -> Router<AppState> {
    STARTED_AT.get_or_init(Instant::now);
    Router::new().route("/health", get(handle_health))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    module: &'static str,
    version: &'static str,
    #[serde(rename = "uptimeSeconds")]
    uptime_seconds: u64,
}

async fn handle_health() -> Json<HealthResponse> {
    let uptime_seconds = STARTED_AT.get_or_init(Instant::now).elapsed().as_secs();

    Json(HealthResponse {
        status: "ok",
        module: "auricle-engine",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
    })
}
