//! `AlertService::sync_from_audit`. Grounded on `alerts/service.py`.

use super::dispatcher::{AlertDispatcher, NoopDispatcher};
use crate::domain::{EscalationStage, JsonMap, SignalLevel};
use crate::store::alert::{AlertStore, Notification, Subscription};
use crate::store::audit::{AuditEvent, AuditService};
use anyhow::Result;
use serde_json::{json, Value};

struct AlertItem {
    event_id: i64,
    event_time: String,
    severity: SignalLevel,
    source: String,
    message: String,
    payload: JsonMap,
}

fn severity_str(level: SignalLevel) -> &'static str {
    match level {
        SignalLevel::Info => "INFO",
        SignalLevel::Warning => "WARNING",
        SignalLevel::Critical => "CRITICAL",
    }
}

pub struct AlertService {
    store: AlertStore,
    audit: AuditService,
    dispatcher: Box<dyn AlertDispatcher>,
    default_runbook_base_url: String,
}

impl AlertService {
    pub fn new(store: AlertStore, audit: AuditService, dispatcher: Box<dyn AlertDispatcher>, default_runbook_base_url: String) -> Self {
        AlertService {
            store,
            audit,
            dispatcher,
            default_runbook_base_url: default_runbook_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn noop(store: AlertStore, audit: AuditService) -> Self {
        Self::new(store, audit, Box::new(NoopDispatcher), String::new())
    }

    pub fn create_subscription(&self, sub: &Subscription) -> Result<i64> {
        self.store.create_subscription(sub)
    }

    pub fn list_notifications(&self, only_unacked: bool, limit: i64) -> Result<Vec<Notification>> {
        self.store.list_notifications(only_unacked, limit)
    }

    pub fn ack_notification(&self, notification_id: i64) -> Result<bool> {
        self.store.ack_notification(notification_id)
    }

    /// Classifies the last `limit` audit events oldest-to-newest, matches each
    /// against enabled subscriptions, inserts a deduped Notification per match, and
    /// dispatches it. Returns the count of newly inserted notifications.
    pub async fn sync_from_audit(&self, limit: i64) -> Result<i64> {
        let events = self.audit.list_recent_oldest_first(limit)?;
        let subscriptions = self.store.list_enabled_subscriptions()?;
        let mut inserted = 0i64;

        for event in &events {
            let Some(alert) = Self::event_to_alert(event) else {
                continue;
            };
            for sub in &subscriptions {
                if !Self::subscription_match(sub, &event.event_type, &alert) {
                    continue;
                }
                let dedupe_key = format!("{}|{}", alert.source, alert.message);
                if self.store.exists_recent_notification(sub.id, &dedupe_key, sub.dedupe_window_sec)? {
                    continue;
                }
                let row_id = self.store.insert_notification(
                    sub.id,
                    alert.event_id,
                    alert.severity,
                    &alert.source,
                    &alert.message,
                    &alert.payload,
                    &dedupe_key,
                )?;
                let Some(notification_id) = row_id else {
                    continue;
                };
                inserted += 1;
                self.dispatch_notification(sub, notification_id, &alert).await;
            }
        }
        Ok(inserted)
    }

    async fn dispatch_notification(&self, sub: &Subscription, notification_id: i64, alert: &AlertItem) {
        let channel = sub.channel.trim().to_ascii_lowercase();
        if channel == "inbox" {
            let _ = self.store.insert_delivery(notification_id, sub.id, "inbox", "inbox", "SKIPPED", None, &json!({"reason": "inbox_only"}));
            return;
        }

        let runbook = self.resolve_runbook_url(sub, alert);
        let escalation_level = resolve_escalation_level(&alert.payload, alert.severity);
        let subject = format!("[{}] {}", severity_str(alert.severity), alert.source);
        let message = render_message(alert, &runbook, escalation_level);
        let base_payload = json!({
            "event_id": alert.event_id,
            "source": alert.source,
            "severity": severity_str(alert.severity),
            "escalation_level": escalation_level,
            "runbook_url": runbook,
        });

        if channel == "oncall" {
            self.dispatch_oncall(sub, notification_id, &subject, &message, &base_payload, escalation_level).await;
            return;
        }

        let targets = resolve_targets(&channel, &sub.channel_config);
        if targets.is_empty() {
            let _ = self.store.insert_delivery(notification_id, sub.id, &channel, "", "FAILED", Some("channel target is empty"), &base_payload);
            return;
        }

        for target in targets {
            let result = self.dispatcher.send(&channel, &target, &subject, &message, &base_payload).await;
            let mut payload = base_payload.clone();
            if let Value::Object(map) = &mut payload {
                map.insert("provider_status".to_string(), json!(result.provider_status));
            }
            let status = if result.success { "SENT" } else { "FAILED" };
            let _ = self.store.insert_delivery(
                notification_id,
                sub.id,
                &channel,
                &target,
                status,
                if result.success { None } else { Some(result.error_message.as_str()) },
                &payload,
            );
        }
    }

    async fn dispatch_oncall(
        &self,
        sub: &Subscription,
        notification_id: i64,
        subject: &str,
        message: &str,
        base_payload: &Value,
        escalation_level: i32,
    ) {
        let stages = resolve_escalation_chain(sub);
        let mut triggered = false;
        for stage in &stages {
            if escalation_level < stage.level_threshold {
                continue;
            }
            let channel = if stage.channel.is_empty() { "im".to_string() } else { stage.channel.trim().to_ascii_lowercase() };
            let mut targets: Vec<String> = stage.targets.iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect();
            if targets.is_empty() {
                targets = resolve_targets(&channel, &sub.channel_config);
            }
            if targets.is_empty() {
                let mut payload = base_payload.clone();
                if let Value::Object(map) = &mut payload {
                    map.insert("stage_note".to_string(), json!(stage.note));
                }
                let error = format!("no targets for escalation stage >= L{}", stage.level_threshold);
                let _ = self.store.insert_delivery(notification_id, sub.id, &channel, "", "FAILED", Some(error.as_str()), &payload);
                continue;
            }
            triggered = true;
            for target in &targets {
                let mut send_payload = base_payload.clone();
                if let Value::Object(map) = &mut send_payload {
                    map.insert("stage_note".to_string(), json!(stage.note));
                    map.insert("stage_level_threshold".to_string(), json!(stage.level_threshold));
                }
                let result = self.dispatcher.send(&channel, target, subject, message, &send_payload).await;
                if let Value::Object(map) = &mut send_payload {
                    map.insert("provider_status".to_string(), json!(result.provider_status));
                }
                let status = if result.success { "SENT" } else { "FAILED" };
                let _ = self.store.insert_delivery(
                    notification_id,
                    sub.id,
                    &channel,
                    target,
                    status,
                    if result.success { None } else { Some(result.error_message.as_str()) },
                    &send_payload,
                );
            }
        }
        if !triggered {
            let mut payload = base_payload.clone();
            if let Value::Object(map) = &mut payload {
                map.insert("reason".to_string(), json!(format!("escalation level={escalation_level} did not match any escalation stage")));
            }
            let _ = self.store.insert_delivery(notification_id, sub.id, "oncall", "", "SKIPPED", None, &payload);
        }
    }

    fn resolve_runbook_url(&self, sub: &Subscription, alert: &AlertItem) -> String {
        if let Some(url) = &sub.runbook_url {
            if !url.is_empty() {
                return url.clone();
            }
        }
        if let Some(raw) = alert.payload.get("runbook_url").and_then(|v| v.as_str()) {
            if !raw.trim().is_empty() {
                return raw.trim().to_string();
            }
        }
        if let Some(connector) = alert.payload.get("connector_name").and_then(|v| v.as_str()) {
            if !connector.trim().is_empty() && !self.default_runbook_base_url.is_empty() {
                return format!("{}/{}", self.default_runbook_base_url, connector.trim());
            }
        }
        String::new()
    }

    fn subscription_match(sub: &Subscription, event_type: &str, alert: &AlertItem) -> bool {
        if !sub.event_types.is_empty() && !sub.event_types.iter().any(|t| t == event_type) {
            return false;
        }
        alert.severity.rank() >= sub.min_severity.rank()
    }

    fn event_to_alert(event: &AuditEvent) -> Option<AlertItem> {
        let payload: JsonMap = serde_json::from_str(&event.payload_json).unwrap_or_default();
        let mut severity = SignalLevel::Info;
        let mut message = format!("{}:{}", event.event_type, event.action);

        if matches!(event.event_type.as_str(), "ops_sla" | "event_connector_sla" | "event_connector_sla_escalation") {
            let raw = payload.get("severity").and_then(|v| v.as_str()).unwrap_or("WARNING").to_uppercase();
            severity = if raw == "CRITICAL" { SignalLevel::Critical } else { SignalLevel::Warning };
            if let Some(m) = payload.get("message").and_then(|v| v.as_str()).filter(|m| !m.trim().is_empty()) {
                message = m.to_string();
            } else if event.event_type == "event_connector_sla_escalation" {
                let reason = payload.get("escalation_reason").and_then(|v| v.as_str());
                let connector = payload.get("connector_name").and_then(|v| v.as_str()).unwrap_or("connector");
                if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
                    message = format!("{connector} escalation: {reason}");
                }
            }
        } else if event.status.eq_ignore_ascii_case("ERROR") {
            severity = SignalLevel::Critical;
            if let Some(err) = payload.get("error").and_then(|v| v.as_str()).filter(|e| !e.trim().is_empty()) {
                message = err.to_string();
            }
        } else if payload.get("blocked").and_then(|v| v.as_bool()) == Some(true) {
            severity = SignalLevel::Warning;
            message = "Blocked signal or risk event.".to_string();
        } else if matches!(event.event_type.as_str(), "portfolio_risk" | "risk_check") {
            severity = SignalLevel::Warning;
            message = "Risk event generated.".to_string();
        } else if event.event_type == "compliance" && payload.get("passed").and_then(|v| v.as_bool()) == Some(false) {
            severity = SignalLevel::Warning;
            message = "Compliance preflight failed.".to_string();
        }

        if severity == SignalLevel::Info {
            return None;
        }
        Some(AlertItem {
            event_id: event.id,
            event_time: event.event_time.clone(),
            severity,
            source: event.event_type.clone(),
            message,
            payload,
        })
    }
}

fn resolve_escalation_level(payload: &JsonMap, severity: SignalLevel) -> i32 {
    if let Some(raw) = payload.get("escalation_level") {
        let parsed = raw.as_i64().or_else(|| raw.as_str().and_then(|s| s.parse::<i64>().ok()));
        if let Some(value) = parsed {
            return value.clamp(0, 10) as i32;
        }
    }
    match severity {
        SignalLevel::Critical => 2,
        SignalLevel::Warning => 1,
        SignalLevel::Info => 0,
    }
}

fn resolve_escalation_chain(sub: &Subscription) -> Vec<EscalationStage> {
    let mut stages: Vec<EscalationStage> = sub
        .escalation_chain
        .iter()
        .filter(|s| !s.targets.is_empty() || !s.channel.is_empty())
        .cloned()
        .collect();
    if stages.is_empty() {
        return vec![EscalationStage {
            level_threshold: 1,
            channel: "im".to_string(),
            targets: Vec::new(),
            note: String::new(),
        }];
    }
    stages.sort_by_key(|s| s.level_threshold);
    stages
}

fn to_targets(raw: Option<&Value>) -> Vec<String> {
    match raw {
        None => Vec::new(),
        Some(Value::String(s)) => {
            let text = s.trim();
            if text.is_empty() {
                Vec::new()
            } else if text.contains(',') {
                text.split(',').map(|x| x.trim().to_string()).filter(|x| !x.is_empty()).collect()
            } else {
                vec![text.to_string()]
            }
        }
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn resolve_targets(channel: &str, config: &JsonMap) -> Vec<String> {
    let raw = match channel {
        "email" => config.get("email_to").or_else(|| config.get("to")).or_else(|| config.get("targets")),
        "im" => config.get("im_to").or_else(|| config.get("webhooks")).or_else(|| config.get("targets")),
        _ => config.get("targets"),
    };
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in to_targets(raw) {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

fn render_message(alert: &AlertItem, runbook_url: &str, escalation_level: i32) -> String {
    let mut lines = vec![
        format!("Alert Source: {}", alert.source),
        format!("Severity: {}", severity_str(alert.severity)),
        format!("Message: {}", alert.message),
        format!("Event Time: {}", alert.event_time),
        format!("Audit Event ID: {}", alert.event_id),
        format!("Escalation Level: {escalation_level}"),
    ];
    if !runbook_url.is_empty() {
        lines.push(format!("Runbook: {runbook_url}"));
    }
    lines.join("\n")
}
