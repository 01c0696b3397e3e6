//! Job registry, manual run trigger, and scheduler tick/SLA endpoints. Mirrors what
//! `SchedulerWorker` (src/ops/scheduler.rs) already drives on a timer, exposed here
//! for manual operation and inspection.

use crate::error::AppResult;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct RegisterJobRequest {
    pub job_name: String,
    pub cron_expr: String,
    pub sla_minutes: i64,
    pub handler: String,
}

pub async fn register_job(State(state): State<AppState>, Json(req): Json<RegisterJobRequest>) -> AppResult<Json<Value>> {
    let id = state.jobs.register_job(&req.job_name, &req.cron_expr, req.sla_minutes, &req.handler)?;
    Ok(Json(json!({ "id": id })))
}

pub async fn list_jobs(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let jobs = state.jobs.list_jobs()?;
    Ok(Json(serde_json::to_value(jobs).unwrap()))
}

pub async fn run_job(State(state): State<AppState>, Path(job_name): Path<String>) -> AppResult<Json<Value>> {
    let summary = state.jobs.run_job_now(&job_name)?;
    Ok(Json(json!({ "job_name": job_name, "summary": summary })))
}

pub async fn scheduler_tick(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let result = state.jobs.scheduler_tick(Utc::now(), "api")?;
    Ok(Json(serde_json::to_value(result).unwrap()))
}

#[derive(Deserialize)]
pub struct SlaQuery {
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    pub running_timeout_minutes: Option<i64>,
}

fn default_grace_minutes() -> i64 {
    15
}

pub async fn scheduler_sla(State(state): State<AppState>, Query(q): Query<SlaQuery>) -> AppResult<Json<Value>> {
    let breaches = state.jobs.evaluate_sla(Utc::now(), q.grace_minutes, q.running_timeout_minutes)?;
    Ok(Json(serde_json::to_value(breaches).unwrap()))
}
