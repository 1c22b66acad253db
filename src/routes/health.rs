use axum::Json;
use serde_json::{json, Value};

/// Health check endpoint for Docker and load balancers.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
