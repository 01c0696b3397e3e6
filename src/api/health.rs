//! Liveness endpoint. Unauthenticated, mounted outside the auth-guarded router.

use axum::Json;
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
