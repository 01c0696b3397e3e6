//! Read path over the append-only hash-chained audit log: listing, chain
//! verification, and CSV/JSONL export for downstream archival.

use crate::error::AppResult;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct ListQuery {
    pub event_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    500
}

pub async fn list_events(State(state): State<AppState>, Query(q): Query<ListQuery>) -> AppResult<Json<Value>> {
    let events = state.audit.list_events(q.event_type.as_deref(), q.limit)?;
    let out: Vec<Value> = events
        .into_iter()
        .map(|e| {
            json!({
                "id": e.id,
                "event_time": e.event_time,
                "event_type": e.event_type,
                "action": e.action,
                "status": e.status,
                "payload": e.payload_json,
                "prev_hash": e.prev_hash,
                "event_hash": e.event_hash,
            })
        })
        .collect();
    Ok(Json(json!(out)))
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub async fn verify_chain(State(state): State<AppState>, Query(q): Query<VerifyQuery>) -> AppResult<Json<Value>> {
    let (valid, broken_id, checked) = state.audit.verify_chain(q.limit)?;
    Ok(Json(json!({ "valid": valid, "broken_id": broken_id, "checked": checked })))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub watermark: String,
}

pub async fn export_csv(State(state): State<AppState>, Query(q): Query<ExportQuery>) -> AppResult<String> {
    Ok(state.audit.export_csv(q.limit, &q.watermark)?)
}

pub async fn export_jsonl(State(state): State<AppState>, Query(q): Query<ExportQuery>) -> AppResult<String> {
    Ok(state.audit.export_jsonl(q.limit, &q.watermark)?)
}
