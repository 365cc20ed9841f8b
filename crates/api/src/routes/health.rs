//! Liveness endpoints.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET / returns the service status.
pub async fn status() -> Json<HealthResponse> {
    Json(HealthResponse { status: "on-line" })
}

/// GET /health returns system health status.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
