//! Liveness check for load balancers and monitoring.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

/// 200 when the database answers, 503 otherwise. No authentication.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database_ok = state.db.health_check().await;
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "success": database_ok,
            "data": {
                "status": if database_ok { "ok" } else { "degraded" },
                "database": database_ok,
                "serverTime": Utc::now().to_rfc3339(),
            },
        })),
    )
}
