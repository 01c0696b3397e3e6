//! Strategy governance state machine: draft -> in_review -> approved|rejected,
//! with a separate retire transition. Wraps `StrategyGovernance` one-to-one.

use crate::domain::GovernanceDecision;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct RegisterDraftRequest {
    pub strategy_name: String,
    pub required_roles: Vec<String>,
    pub min_approvals: i64,
}

pub async fn register_draft(State(state): State<AppState>, Json(req): Json<RegisterDraftRequest>) -> AppResult<Json<Value>> {
    let id = state.governance.register_draft(&req.strategy_name, &req.required_roles, req.min_approvals)?;
    Ok(Json(json!({ "id": id })))
}

pub async fn submit_review(State(state): State<AppState>, Path(strategy_name): Path<String>) -> AppResult<Json<Value>> {
    state.governance.submit_review(&strategy_name)?;
    Ok(Json(json!({ "strategy_name": strategy_name, "status": "IN_REVIEW" })))
}

#[derive(Deserialize)]
pub struct DecideRequest {
    pub role: String,
    pub reviewer: String,
    pub decision: GovernanceDecision,
    #[serde(default)]
    pub comment: String,
}

pub async fn decide(State(state): State<AppState>, Path(strategy_name): Path<String>, Json(req): Json<DecideRequest>) -> AppResult<Json<Value>> {
    let status = state
        .governance
        .decide(&strategy_name, &req.role, &req.reviewer, req.decision, &req.comment)?;
    Ok(Json(json!({ "strategy_name": strategy_name, "status": status })))
}

pub async fn retire(State(state): State<AppState>, Path(strategy_name): Path<String>) -> AppResult<Json<Value>> {
    state.governance.retire(&strategy_name)?;
    Ok(Json(json!({ "strategy_name": strategy_name, "status": "RETIRED" })))
}

pub async fn get_strategy(State(state): State<AppState>, Path(strategy_name): Path<String>) -> AppResult<Json<Value>> {
    let strategy = state
        .governance
        .get(&strategy_name)?
        .ok_or_else(|| AppError::NotFound(format!("strategy '{strategy_name}' not found")))?;
    Ok(Json(serde_json::to_value(strategy).map_err(|e| AppError::Internal(e.to_string()))?))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn history(State(state): State<AppState>, Path(strategy_name): Path<String>, Query(q): Query<HistoryQuery>) -> AppResult<Json<Value>> {
    let records = state.governance.history(&strategy_name, q.limit)?;
    Ok(Json(serde_json::to_value(records).map_err(|e| AppError::Internal(e.to_string()))?))
}
