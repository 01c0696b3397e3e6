//! Subscription management and notification inbox. `sync_from_audit` itself is
//! driven by `SchedulerWorker` on a timer; the manual `sync` route here exists for
//! operators who want to force a sweep outside that cadence.

use crate::domain::{EscalationStage, JsonMap, SignalLevel};
use crate::error::AppResult;
use crate::state::AppState;
use crate::store::alert::Subscription;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct CreateSubscriptionRequest {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub event_types: Vec<String>,
    pub min_severity: SignalLevel,
    #[serde(default)]
    pub dedupe_window_sec: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub channel: String,
    #[serde(default)]
    pub channel_config: JsonMap,
    #[serde(default)]
    pub escalation_chain: Vec<EscalationStage>,
    #[serde(default)]
    pub runbook_url: Option<String>,
}

fn default_true() -> bool {
    true
}

pub async fn create_subscription(State(state): State<AppState>, Json(req): Json<CreateSubscriptionRequest>) -> AppResult<Json<Value>> {
    let id = state.alerts.create_subscription(&Subscription {
        id: 0,
        name: req.name,
        owner: req.owner,
        event_types: req.event_types,
        min_severity: req.min_severity,
        dedupe_window_sec: req.dedupe_window_sec,
        enabled: req.enabled,
        channel: req.channel,
        channel_config: req.channel_config,
        escalation_chain: req.escalation_chain,
        runbook_url: req.runbook_url,
    })?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub only_unacked: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    200
}

pub async fn list_notifications(State(state): State<AppState>, Query(q): Query<NotificationsQuery>) -> AppResult<Json<Value>> {
    let notifications = state.alerts.list_notifications(q.only_unacked, q.limit)?;
    let out: Vec<Value> = notifications
        .into_iter()
        .map(|n| {
            json!({
                "id": n.id,
                "subscription_id": n.subscription_id,
                "event_id": n.event_id,
                "created_at": n.created_at,
                "severity": n.severity,
                "source": n.source,
                "message": n.message,
                "payload": n.payload,
                "acked": n.acked,
                "acked_at": n.acked_at,
                "dedupe_key": n.dedupe_key,
            })
        })
        .collect();
    Ok(Json(json!(out)))
}

pub async fn ack_notification(State(state): State<AppState>, Path(notification_id): Path<i64>) -> AppResult<Json<Value>> {
    let acked = state.alerts.ack_notification(notification_id)?;
    Ok(Json(json!({ "notification_id": notification_id, "acked": acked })))
}

pub async fn sync(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let inserted = state.alerts.sync_from_audit(500).await?;
    Ok(Json(json!({ "inserted": inserted })))
}
