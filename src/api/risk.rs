//! Ad-hoc risk evaluation endpoints: the same `RiskEngine` the daily pipeline calls
//! per candidate, exposed directly for callers that already hold a `RiskCheckRequest`
//! (e.g. a manual override review) or want a standalone portfolio-level check.

use crate::domain::{PortfolioRiskRequest, PortfolioRiskResult, RiskCheckRequest, RiskCheckResult};
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn evaluate_signal(State(state): State<AppState>, Json(req): Json<RiskCheckRequest>) -> Json<RiskCheckResult> {
    Json(state.risk.evaluate_signal(&req))
}

pub async fn evaluate_portfolio(State(state): State<AppState>, Json(req): Json<PortfolioRiskRequest>) -> Json<PortfolioRiskResult> {
    Json(state.risk.evaluate_portfolio(&req))
}
