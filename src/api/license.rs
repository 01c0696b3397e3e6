//! Data-licensing registry and the export/usage gate used before serving licensed
//! datasets.

use crate::error::AppResult;
use crate::state::AppState;
use crate::store::license::License;
use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn register(State(state): State<AppState>, Json(req): Json<License>) -> AppResult<Json<Value>> {
    let id = state.license.register(&req)?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct CheckRequest {
    pub dataset_name: String,
    pub provider: String,
    pub usage: String,
    #[serde(default)]
    pub export_requested: bool,
    pub expected_rows: Option<i64>,
    pub as_of: NaiveDate,
}

pub async fn check(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> AppResult<Json<Value>> {
    let result = state
        .license
        .check(&req.dataset_name, &req.provider, &req.usage, req.export_requested, req.expected_rows, req.as_of)?;
    Ok(Json(serde_json::to_value(result).unwrap()))
}
