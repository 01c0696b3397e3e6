//! Manual holdings ledger: lot entry and the derived average-cost position view.

use crate::domain::ManualHoldingSide;
use crate::error::AppResult;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct RecordLotRequest {
    pub symbol: String,
    pub side: ManualHoldingSide,
    pub quantity: i64,
    pub price: f64,
    pub trade_time: String,
    #[serde(default)]
    pub note: String,
}

pub async fn record_lot(State(state): State<AppState>, Json(req): Json<RecordLotRequest>) -> AppResult<Json<Value>> {
    let id = state
        .holdings
        .record_lot(&req.symbol, req.side, req.quantity, req.price, &req.trade_time, &req.note)?;
    Ok(Json(json!({ "id": id })))
}

pub async fn position(State(state): State<AppState>, Path(symbol): Path<String>) -> AppResult<Json<Value>> {
    let position = state.holdings.position(&symbol)?;
    Ok(Json(serde_json::to_value(position).unwrap()))
}

pub async fn lots(State(state): State<AppState>, Path(symbol): Path<String>) -> AppResult<Json<Value>> {
    let lots = state.holdings.lots(&symbol)?;
    Ok(Json(serde_json::to_value(lots).unwrap()))
}

pub async fn all_positions(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let positions = state.holdings.all_positions()?;
    Ok(Json(serde_json::to_value(positions).unwrap()))
}
