//! Signal generation: runs the daily pipeline for the requested symbols and
//! strategy, returning trade-ready sheets alongside the per-symbol run stats.

use crate::error::AppResult;
use crate::pipelines::{PipelineRequest, PipelineRunResult};
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn generate(State(state): State<AppState>, Json(req): Json<PipelineRequest>) -> AppResult<Json<PipelineRunResult>> {
    let result = state.pipeline.run(&req).await?;
    Ok(Json(result))
}
