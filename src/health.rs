//! Health check HTTP endpoints for deployment platform monitoring.
//!
//! Liveness answers while the process runs; readiness also requires the
//! database to answer a probe query.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Router};

use crate::database::Database;

/// Shared state for the health endpoints.
#[derive(Clone)]
struct HealthState {
    db: Arc<Database>,
}

/// Build the health router.
pub fn health_router(db: Arc<Database>) -> Router {
    Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(HealthState { db })
}

/// Start the health check HTTP server.
pub async fn start_health_server(db: Arc<Database>, port: u16) {
    let app = health_router(db);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(port = port, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind health check port");

    axum::serve(listener, app)
        .await
        .expect("health check server failed");
}

/// Liveness probe - returns 200 OK while the process is up.
async fn liveness_handler() -> &'static str {
    "OK"
}

/// Readiness probe - returns 200 only when the database answers.
async fn readiness_handler(State(state): State<HealthState>) -> (StatusCode, &'static str) {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "READY"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

/// Spawn the health check server as a background task.
pub fn spawn_health_server(db: Arc<Database>, port: u16) {
    tokio::spawn(async move {
        start_health_server(db, port).await;
    });
}
