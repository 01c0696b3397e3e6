//! Subscriptions, Notifications, and Deliveries. Grounded on
//! `alerts/store.py`.

use crate::domain::{EscalationStage, JsonMap, SignalLevel};
use crate::util::now_iso;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub event_types: Vec<String>,
    pub min_severity: SignalLevel,
    pub dedupe_window_sec: i64,
    pub enabled: bool,
    pub channel: String,
    pub channel_config: JsonMap,
    pub escalation_chain: Vec<EscalationStage>,
    pub runbook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    pub subscription_id: i64,
    pub event_id: i64,
    pub created_at: String,
    pub severity: SignalLevel,
    pub source: String,
    pub message: String,
    pub payload: JsonMap,
    pub acked: bool,
    pub acked_at: Option<String>,
    pub dedupe_key: String,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: i64,
    pub notification_id: i64,
    pub subscription_id: i64,
    pub channel: String,
    pub target: String,
    pub status: String,
    pub error_message: Option<String>,
    pub payload: JsonMap,
}

pub struct AlertStore {
    db_path: String,
}

fn severity_str(level: SignalLevel) -> &'static str {
    match level {
        SignalLevel::Info => "INFO",
        SignalLevel::Warning => "WARNING",
        SignalLevel::Critical => "CRITICAL",
    }
}

fn parse_severity(s: &str) -> SignalLevel {
    match s {
        "CRITICAL" => SignalLevel::Critical,
        "WARNING" => SignalLevel::Warning,
        _ => SignalLevel::Info,
    }
}

impl AlertStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = AlertStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening alert db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                event_types TEXT NOT NULL,
                min_severity TEXT NOT NULL,
                dedupe_window_sec INTEGER NOT NULL,
                enabled INTEGER NOT NULL,
                channel TEXT NOT NULL,
                channel_config TEXT NOT NULL,
                escalation_chain TEXT NOT NULL,
                runbook_url TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscription_id INTEGER NOT NULL,
                event_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                severity TEXT NOT NULL,
                source TEXT NOT NULL,
                message TEXT NOT NULL,
                payload TEXT NOT NULL,
                acked INTEGER NOT NULL DEFAULT 0,
                acked_at TEXT,
                dedupe_key TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_notif_unique ON notifications(subscription_id, event_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notif_dedupe ON notifications(subscription_id, dedupe_key, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS deliveries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                notification_id INTEGER NOT NULL,
                subscription_id INTEGER NOT NULL,
                channel TEXT NOT NULL,
                target TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                payload TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn create_subscription(&self, sub: &Subscription) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO subscriptions(name, owner, event_types, min_severity, dedupe_window_sec, enabled, channel, channel_config, escalation_chain, runbook_url)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                sub.name, sub.owner, serde_json::to_string(&sub.event_types)?,
                severity_str(sub.min_severity), sub.dedupe_window_sec, sub.enabled as i64,
                sub.channel, serde_json::to_string(&sub.channel_config)?,
                serde_json::to_string(&sub.escalation_chain)?, sub.runbook_url
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_enabled_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, owner, event_types, min_severity, dedupe_window_sec, enabled, channel, channel_config, escalation_chain, runbook_url
             FROM subscriptions WHERE enabled = 1",
        )?;
        let rows = stmt.query_map([], Self::row_to_subscription)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn exists_recent_notification(&self, subscription_id: i64, dedupe_key: &str, window_sec: i64) -> Result<bool> {
        if window_sec <= 0 {
            return Ok(false);
        }
        let conn = self.conn()?;
        let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(window_sec)).to_rfc3339();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM notifications WHERE subscription_id = ?1 AND dedupe_key = ?2 AND created_at >= ?3 LIMIT 1",
                params![subscription_id, dedupe_key, cutoff],
                |r| r.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Returns `Ok(None)` when the unique (subscription_id, event_id) constraint
    /// already held a row — a race with another `sync_from_audit` caller.
    pub fn insert_notification(
        &self,
        subscription_id: i64,
        event_id: i64,
        severity: SignalLevel,
        source: &str,
        message: &str,
        payload: &JsonMap,
        dedupe_key: &str,
    ) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT OR IGNORE INTO notifications(subscription_id, event_id, created_at, severity, source, message, payload, dedupe_key)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                subscription_id, event_id, now_iso(), severity_str(severity), source, message,
                serde_json::to_string(payload)?, dedupe_key
            ],
        )?;
        if result == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    pub fn insert_delivery(
        &self,
        notification_id: i64,
        subscription_id: i64,
        channel: &str,
        target: &str,
        status: &str,
        error_message: Option<&str>,
        payload: &JsonMap,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO deliveries(notification_id, subscription_id, channel, target, status, error_message, payload)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![notification_id, subscription_id, channel, target, status, error_message, serde_json::to_string(payload)?],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_deliveries_for_notification(&self, notification_id: i64) -> Result<Vec<Delivery>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, notification_id, subscription_id, channel, target, status, error_message, payload
             FROM deliveries WHERE notification_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![notification_id], Self::row_to_delivery)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn list_notifications(&self, only_unacked: bool, limit: i64) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 5000);
        let mut stmt = if only_unacked {
            conn.prepare(
                "SELECT id, subscription_id, event_id, created_at, severity, source, message, payload, acked, acked_at, dedupe_key
                 FROM notifications WHERE acked = 0 ORDER BY id DESC LIMIT ?1",
            )?
        } else {
            conn.prepare(
                "SELECT id, subscription_id, event_id, created_at, severity, source, message, payload, acked, acked_at, dedupe_key
                 FROM notifications ORDER BY id DESC LIMIT ?1",
            )?
        };
        let rows = stmt.query_map(params![limit], Self::row_to_notification)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn ack_notification(&self, notification_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET acked = 1, acked_at = ?1 WHERE id = ?2 AND acked = 0",
            params![now_iso(), notification_id],
        )?;
        Ok(updated > 0)
    }

    fn row_to_notification(r: &rusqlite::Row) -> rusqlite::Result<Notification> {
        let severity: String = r.get(4)?;
        let payload: String = r.get(7)?;
        Ok(Notification {
            id: r.get(0)?,
            subscription_id: r.get(1)?,
            event_id: r.get(2)?,
            created_at: r.get(3)?,
            severity: parse_severity(&severity),
            source: r.get(5)?,
            message: r.get(6)?,
            payload: serde_json::from_str(&payload).unwrap_or_default(),
            acked: r.get::<_, i64>(8)? != 0,
            acked_at: r.get(9)?,
            dedupe_key: r.get(10)?,
        })
    }

    fn row_to_subscription(r: &rusqlite::Row) -> rusqlite::Result<Subscription> {
        let event_types: String = r.get(3)?;
        let min_severity: String = r.get(4)?;
        let channel_config: String = r.get(8)?;
        let escalation_chain: String = r.get(9)?;
        Ok(Subscription {
            id: r.get(0)?,
            name: r.get(1)?,
            owner: r.get(2)?,
            event_types: serde_json::from_str(&event_types).unwrap_or_default(),
            min_severity: parse_severity(&min_severity),
            dedupe_window_sec: r.get(5)?,
            enabled: r.get::<_, i64>(6)? != 0,
            channel: r.get(7)?,
            channel_config: serde_json::from_str(&channel_config).unwrap_or_default(),
            escalation_chain: serde_json::from_str(&escalation_chain).unwrap_or_default(),
            runbook_url: r.get(10)?,
        })
    }

    fn row_to_delivery(r: &rusqlite::Row) -> rusqlite::Result<Delivery> {
        let payload: String = r.get(7)?;
        Ok(Delivery {
            id: r.get(0)?,
            notification_id: r.get(1)?,
            subscription_id: r.get(2)?,
            channel: r.get(3)?,
            target: r.get(4)?,
            status: r.get(5)?,
            error_message: r.get(6)?,
            payload: serde_json::from_str(&payload).unwrap_or_default(),
        })
    }
}
