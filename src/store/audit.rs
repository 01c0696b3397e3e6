//! Append-only hash-chained audit log. One SQLite file, a fresh
//! short-lived `Connection` per call — the same pattern `auth::user_store::UserStore`
//! uses for its own tables.

use crate::util::{canonical_json, now_iso};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub event_time: String,
    pub event_type: String,
    pub action: String,
    pub status: String,
    pub payload_json: String,
    pub prev_hash: String,
    pub event_hash: String,
}

pub struct AuditStore {
    db_path: String,
}

impl AuditStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = AuditStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening audit db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_time TEXT NOT NULL,
                event_type TEXT NOT NULL,
                action TEXT NOT NULL,
                status TEXT NOT NULL,
                payload TEXT NOT NULL,
                prev_hash TEXT NOT NULL DEFAULT '',
                event_hash TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_audit_event_type ON audit_events(event_type)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_audit_event_time ON audit_events(event_time DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_audit_status ON audit_events(status)",
            [],
        )?;
        Ok(())
    }

    /// Writes one row under the hash-chain invariant. Never returns an
    /// error past the caller expecting it to swallow failures — that policy lives in
    /// `AuditService::log`, this method itself still surfaces errors honestly.
    pub fn write(
        &self,
        event_type: &str,
        action: &str,
        status: &str,
        payload: &Value,
    ) -> Result<i64> {
        let payload_json = canonical_json(payload);
        let event_time = now_iso();
        let conn = self.conn()?;
        let prev_hash: String = conn
            .query_row(
                "SELECT event_hash FROM audit_events ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_default();

        let raw = format!(
            "{prev_hash}|{event_time}|{event_type}|{action}|{status}|{payload_json}"
        );
        let event_hash = hex::encode(Sha256::digest(raw.as_bytes()));

        conn.execute(
            "INSERT INTO audit_events(event_time, event_type, action, status, payload, prev_hash, event_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![event_time, event_type, action, status, payload_json, prev_hash, event_hash],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_events(&self, event_type: Option<&str>, limit: i64) -> Result<Vec<AuditEvent>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 5000);
        let mut rows = Vec::new();
        let mut push_row = |r: &rusqlite::Row| -> rusqlite::Result<()> {
            rows.push(AuditEvent {
                id: r.get(0)?,
                event_time: r.get(1)?,
                event_type: r.get(2)?,
                action: r.get(3)?,
                status: r.get(4)?,
                payload_json: r.get(5)?,
                prev_hash: r.get(6)?,
                event_hash: r.get(7)?,
            });
            Ok(())
        };
        if let Some(et) = event_type {
            let mut stmt = conn.prepare(
                "SELECT id, event_time, event_type, action, status, payload, prev_hash, event_hash
                 FROM audit_events WHERE event_type = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut it = stmt.query(params![et, limit])?;
            while let Some(r) = it.next()? {
                push_row(r)?;
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, event_time, event_type, action, status, payload, prev_hash, event_hash
                 FROM audit_events ORDER BY id DESC LIMIT ?1",
            )?;
            let mut it = stmt.query(params![limit])?;
            while let Some(r) = it.next()? {
                push_row(r)?;
            }
        }
        Ok(rows)
    }

    /// Last `limit` events, oldest first — used by `AlertService::sync_from_audit`.
    pub fn list_recent_oldest_first(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        let mut events = self.list_events(None, limit)?;
        events.reverse();
        Ok(events)
    }

    /// Walks ascending by id, recomputing the expected hash at each step. Returns
    /// (valid, broken_id, checked_count).
    pub fn verify_chain(&self, limit: i64) -> Result<(bool, Option<i64>, i64)> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 1_000_000);
        let mut stmt = conn.prepare(
            "SELECT id, event_time, event_type, action, status, payload, prev_hash, event_hash
             FROM audit_events ORDER BY id ASC LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit])?;

        let mut previous_accepted_hash = String::new();
        let mut checked = 0i64;
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let event_time: String = row.get(1)?;
            let event_type: String = row.get(2)?;
            let action: String = row.get(3)?;
            let status: String = row.get(4)?;
            let payload: String = row.get(5)?;
            let prev_hash: String = row.get(6)?;
            let event_hash: String = row.get(7)?;

            // Legacy rows predating the hash-chain migration have no hash; skip them.
            if event_hash.is_empty() {
                continue;
            }

            checked += 1;
            let raw = format!(
                "{previous_accepted_hash}|{event_time}|{event_type}|{action}|{status}|{payload}"
            );
            let expected_hash = hex::encode(Sha256::digest(raw.as_bytes()));

            if prev_hash != previous_accepted_hash || event_hash != expected_hash {
                return Ok((false, Some(id), checked));
            }
            previous_accepted_hash = event_hash;
        }
        Ok((true, None, checked))
    }
}

/// Thin service wrapper: the audit-log write path swallows and logs its own
/// exceptions so a logging failure never masks the primary error.
pub struct AuditService {
    store: AuditStore,
}

impl AuditService {
    pub fn new(store: AuditStore) -> Self {
        AuditService { store }
    }

    pub fn log(&self, event_type: &str, action: &str, status: &str, payload: &Value) -> i64 {
        match self.store.write(event_type, action, status, payload) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, event_type, action, "audit write failed");
                -1
            }
        }
    }

    pub fn list_events(&self, event_type: Option<&str>, limit: i64) -> Result<Vec<AuditEvent>> {
        self.store.list_events(event_type, limit)
    }

    pub fn list_recent_oldest_first(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        self.store.list_recent_oldest_first(limit)
    }

    pub fn verify_chain(&self, limit: i64) -> Result<(bool, Option<i64>, i64)> {
        self.store.verify_chain(limit)
    }

    pub fn export_csv(&self, limit: i64, watermark: &str) -> Result<String> {
        let events = self.store.list_events(None, limit)?;
        let mut out = format!("# {watermark}\n");
        out.push_str("id,event_time,event_type,action,status,payload_json\n");
        for e in events.iter().rev() {
            out.push_str(&format!(
                "{},{},{},{},{},\"{}\"\n",
                e.id,
                e.event_time,
                e.event_type,
                e.action,
                e.status,
                e.payload_json.replace('"', "\"\"")
            ));
        }
        Ok(out)
    }

    pub fn export_jsonl(&self, limit: i64, watermark: &str) -> Result<String> {
        let events = self.store.list_events(None, limit)?;
        let mut lines = vec![format!("{{\"watermark\":\"{}\"}}", watermark)];
        for e in events.iter().rev() {
            lines.push(format!(
                "{{\"id\":{},\"event_time\":\"{}\",\"event_type\":\"{}\",\"action\":\"{}\",\"status\":\"{}\",\"payload\":{}}}",
                e.id, e.event_time, e.event_type, e.action, e.status, e.payload_json
            ));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> AuditStore {
        let file = tempfile::NamedTempFile::new().unwrap();
        AuditStore::new(file.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn chain_verifies_after_writes() {
        let store = store();
        store.write("signal", "generate", "OK", &json!({"symbol": "000001"})).unwrap();
        store.write("signal", "generate", "OK", &json!({"symbol": "000002"})).unwrap();
        store.write("signal", "generate", "OK", &json!({"symbol": "000003"})).unwrap();
        let (valid, broken, checked) = store.verify_chain(100).unwrap();
        assert!(valid);
        assert_eq!(broken, None);
        assert_eq!(checked, 3);
    }

    #[test]
    fn corrupting_a_row_breaks_verification_at_that_id() {
        let store = store();
        store.write("signal", "generate", "OK", &json!({"symbol": "000001"})).unwrap();
        store.write("signal", "generate", "OK", &json!({"symbol": "000002"})).unwrap();
        store.write("signal", "generate", "OK", &json!({"symbol": "000003"})).unwrap();

        let conn = store.conn().unwrap();
        conn.execute(
            "UPDATE audit_events SET payload = '{\"tampered\":true}' WHERE id = 2",
            [],
        )
        .unwrap();

        let (valid, broken, checked) = store.verify_chain(100).unwrap();
        assert!(!valid);
        assert_eq!(broken, Some(2));
        assert_eq!(checked, 2);
    }

    #[test]
    fn legacy_rows_with_empty_hash_are_skipped() {
        let store = store();
        let conn = store.conn().unwrap();
        conn.execute(
            "INSERT INTO audit_events(event_time, event_type, action, status, payload, prev_hash, event_hash)
             VALUES ('2020-01-01T00:00:00Z', 'legacy', 'noop', 'OK', '{}', '', '')",
            [],
        )
        .unwrap();
        drop(conn);
        store.write("signal", "generate", "OK", &json!({"symbol": "000001"})).unwrap();
        let (valid, broken, checked) = store.verify_chain(100).unwrap();
        assert!(valid);
        assert_eq!(broken, None);
        assert_eq!(checked, 1);
    }
}
