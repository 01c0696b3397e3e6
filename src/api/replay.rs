//! Signal/execution journal: record a strategy's decision, link fills against it,
//! and report follow-rate/slippage/delay over the joined pairs.

use crate::domain::{ExecutionRecordCreate, SignalRecord};
use crate::error::AppResult;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn record_signal(State(state): State<AppState>, Json(req): Json<SignalRecord>) -> AppResult<Json<Value>> {
    let signal_id = state.replay.record_signal(&req)?;
    Ok(Json(json!({ "signal_id": signal_id })))
}

pub async fn record_execution(State(state): State<AppState>, Json(req): Json<ExecutionRecordCreate>) -> AppResult<Json<Value>> {
    let id = state.replay.record_execution(&req)?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct ListSignalsQuery {
    pub symbol: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    200
}

pub async fn list_signals(State(state): State<AppState>, Query(q): Query<ListSignalsQuery>) -> AppResult<Json<Value>> {
    let signals = state.replay.list_signals(q.symbol.as_deref(), q.limit)?;
    Ok(Json(serde_json::to_value(signals).unwrap()))
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub symbol: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn report(State(state): State<AppState>, Query(q): Query<ReportQuery>) -> AppResult<Json<Value>> {
    let report = state.replay.report(q.symbol.as_deref(), q.start_date, q.end_date, q.limit)?;
    Ok(Json(serde_json::to_value(report).unwrap()))
}
