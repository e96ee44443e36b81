// handlers/system.rs - Liveness, store health and the catch-all 404

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::ApiResult;
use crate::state::AppState;

/// GET /ping
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    match state.store.health().await {
        Ok(()) => Ok(Json(json!({
            "status": "ok",
            "store": state.store.kind(),
            "timestamp": chrono::Utc::now(),
        }))),
        Err(e) => {
            tracing::error!("Store health check failed: {}", e);
            Err(ApiError::service_unavailable("Store unavailable"))
        }
    }
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "status": 404 })))
}
