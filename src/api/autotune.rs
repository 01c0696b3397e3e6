//! Parameter autotuning: activate a global or per-symbol profile, or roll the
//! active one back to the prior state.

use crate::domain::{AutotuneScope, JsonMap};
use crate::error::AppResult;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct ActivateRequest {
    pub strategy_name: String,
    pub scope: AutotuneScope,
    #[serde(default)]
    pub symbol_key: String,
    pub params: JsonMap,
    pub created_by: String,
    #[serde(default)]
    pub note: String,
}

pub async fn activate(State(state): State<AppState>, Json(req): Json<ActivateRequest>) -> AppResult<Json<Value>> {
    let id = state
        .autotune
        .activate(&req.strategy_name, req.scope, &req.symbol_key, &req.params, &req.created_by, &req.note)?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    pub strategy_name: String,
    pub scope: AutotuneScope,
    #[serde(default)]
    pub symbol_key: String,
}

pub async fn rollback(State(state): State<AppState>, Json(req): Json<RollbackRequest>) -> AppResult<Json<Value>> {
    let restored_id = state.autotune.rollback(&req.strategy_name, req.scope, &req.symbol_key)?;
    Ok(Json(json!({ "restored_id": restored_id })))
}
