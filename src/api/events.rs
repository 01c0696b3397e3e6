//! Corporate event source registry, batch ingest, and point-in-time join checks.

use crate::error::AppResult;
use crate::state::AppState;
use crate::store::event::{EventRecordCreate, EventSource};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn register_source(State(state): State<AppState>, Json(req): Json<EventSource>) -> AppResult<Json<Value>> {
    let id = state.events.register_source(&req)?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct IngestBatchRequest {
    pub source_name: String,
    pub events: Vec<EventRecordCreate>,
}

pub async fn ingest_batch(State(state): State<AppState>, Json(req): Json<IngestBatchRequest>) -> AppResult<Json<Value>> {
    let (inserted, skipped, errors) = state.events.ingest_batch(&req.source_name, &req.events)?;
    Ok(Json(json!({ "inserted": inserted, "skipped": skipped, "errors": errors })))
}

#[derive(Deserialize)]
pub struct ValidateJoinRequest {
    pub source_name: String,
    pub event_id: String,
    pub used_in_trade_time: DateTime<Utc>,
}

pub async fn validate_join(State(state): State<AppState>, Json(req): Json<ValidateJoinRequest>) -> AppResult<Json<Value>> {
    let hits = state
        .events
        .validate_join(&req.source_name, &req.event_id, req.used_in_trade_time)?;
    Ok(Json(serde_json::to_value(hits).unwrap()))
}
