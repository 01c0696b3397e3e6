//! Dataset snapshot registry: records the exact range/hash a downstream consumer
//! read, for later reproducibility checks.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct RegisterSnapshotRequest {
    pub dataset_name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub provider: String,
    pub schema_version: String,
    pub content: Value,
}

pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterSnapshotRequest>) -> AppResult<Json<Value>> {
    let id = state.snapshots.register(
        &req.dataset_name,
        &req.symbol,
        req.start_date,
        req.end_date,
        &req.provider,
        &req.schema_version,
        &req.content,
    )?;
    Ok(Json(json!({ "id": id })))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    let snapshot = state
        .snapshots
        .get(id)?
        .ok_or_else(|| AppError::NotFound(format!("snapshot '{id}' not found")))?;
    Ok(Json(serde_json::to_value(snapshot).map_err(|e| AppError::Internal(e.to_string()))?))
}
