//! Corporate event ingest-with-upsert store.
//! Grounded on `governance/event_store.py`.

use crate::domain::{EventPolarity, EventRecord, JsonMap};
use crate::util::now_iso;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default)]
    pub id: i64,
    pub source_name: String,
    pub source_type: String,
    pub provider: String,
    pub timezone: String,
    pub ingestion_lag_minutes: i64,
    pub reliability_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecordCreate {
    pub event_id: String,
    pub symbol: String,
    pub event_type: String,
    pub publish_time: DateTime<Utc>,
    pub effective_time: Option<DateTime<Utc>>,
    pub polarity: EventPolarity,
    pub score: f64,
    pub confidence: f64,
    pub title: String,
    pub summary: String,
    pub raw_ref: Option<String>,
    pub tags: Vec<String>,
    pub metadata: JsonMap,
}

pub struct EventStore {
    db_path: String,
}

impl EventStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = EventStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening event db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS event_sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                source_name TEXT NOT NULL UNIQUE,
                source_type TEXT NOT NULL,
                provider TEXT NOT NULL,
                timezone TEXT NOT NULL,
                ingestion_lag_minutes INTEGER NOT NULL,
                reliability_score REAL NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS event_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                source_name TEXT NOT NULL,
                event_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                event_type TEXT NOT NULL,
                publish_time TEXT NOT NULL,
                effective_time TEXT,
                polarity TEXT NOT NULL,
                score REAL NOT NULL,
                confidence REAL NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                raw_ref TEXT,
                tags TEXT NOT NULL,
                metadata TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_event_unique_source_event
             ON event_records(source_name, event_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_event_symbol_time ON event_records(symbol, publish_time DESC)",
            [],
        )?;
        Ok(())
    }

    pub fn register_source(&self, src: &EventSource) -> Result<i64> {
        let now = now_iso();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO event_sources(created_at, updated_at, source_name, source_type, provider, timezone, ingestion_lag_minutes, reliability_score)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
             ON CONFLICT(source_name) DO UPDATE SET
                updated_at=excluded.updated_at, source_type=excluded.source_type, provider=excluded.provider,
                timezone=excluded.timezone, ingestion_lag_minutes=excluded.ingestion_lag_minutes,
                reliability_score=excluded.reliability_score",
            params![now, now, src.source_name, src.source_type, src.provider, src.timezone, src.ingestion_lag_minutes, src.reliability_score],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM event_sources WHERE source_name = ?1",
            params![src.source_name],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn get_source(&self, source_name: &str) -> Result<Option<EventSource>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, source_name, source_type, provider, timezone, ingestion_lag_minutes, reliability_score
             FROM event_sources WHERE source_name = ?1",
            params![source_name],
            |r| {
                Ok(EventSource {
                    id: r.get(0)?,
                    source_name: r.get(1)?,
                    source_type: r.get(2)?,
                    provider: r.get(3)?,
                    timezone: r.get(4)?,
                    ingestion_lag_minutes: r.get(5)?,
                    reliability_score: r.get(6)?,
                })
            },
        )
        .optional()
        .context("fetching event source")
    }

    /// Insert-if-absent, update-otherwise keyed by (source_name, event_id). Returns
    /// (inserted, updated, errors).
    pub fn ingest_batch(
        &self,
        source_name: &str,
        events: &[EventRecordCreate],
    ) -> Result<(i64, i64, Vec<String>)> {
        if self.get_source(source_name)?.is_none() {
            anyhow::bail!("event source '{source_name}' not found");
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0i64;
        let mut updated = 0i64;
        let mut errors = Vec::new();
        for (idx, event) in events.iter().enumerate() {
            let result = (|| -> Result<bool> {
                let now = now_iso();
                let tags = serde_json::to_string(&event.tags)?;
                let metadata = serde_json::to_string(&event.metadata)?;
                let exists: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM event_records WHERE source_name = ?1 AND event_id = ?2",
                        params![source_name, event.event_id],
                        |r| r.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    tx.execute(
                        "INSERT INTO event_records(created_at, updated_at, source_name, event_id, symbol, event_type,
                            publish_time, effective_time, polarity, score, confidence, title, summary, raw_ref, tags, metadata)
                         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
                        params![
                            now, now, source_name, event.event_id, event.symbol, event.event_type,
                            event.publish_time.to_rfc3339(), event.effective_time.map(|t| t.to_rfc3339()),
                            serde_json::to_string(&event.polarity)?.trim_matches('"'),
                            event.score, event.confidence, event.title, event.summary, event.raw_ref,
                            tags, metadata
                        ],
                    )?;
                    Ok(true)
                } else {
                    tx.execute(
                        "UPDATE event_records SET updated_at=?1, symbol=?2, event_type=?3, publish_time=?4,
                            effective_time=?5, polarity=?6, score=?7, confidence=?8, title=?9, summary=?10,
                            raw_ref=?11, tags=?12, metadata=?13
                         WHERE source_name=?14 AND event_id=?15",
                        params![
                            now, event.symbol, event.event_type, event.publish_time.to_rfc3339(),
                            event.effective_time.map(|t| t.to_rfc3339()),
                            serde_json::to_string(&event.polarity)?.trim_matches('"'),
                            event.score, event.confidence, event.title, event.summary, event.raw_ref,
                            tags, metadata, source_name, event.event_id
                        ],
                    )?;
                    Ok(false)
                }
            })();
            match result {
                Ok(true) => inserted += 1,
                Ok(false) => updated += 1,
                Err(e) => errors.push(format!("idx={idx}, event_id={}: {e}", event.event_id)),
            }
        }
        tx.commit()?;
        Ok((inserted, updated, errors))
    }

    pub fn list_symbol_events_between(
        &self,
        symbol: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<EventRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_name, event_id, symbol, event_type, publish_time, effective_time,
                    polarity, score, confidence, title, summary, raw_ref, tags, metadata
             FROM event_records
             WHERE symbol = ?1 AND publish_time >= ?2 AND publish_time <= ?3
             ORDER BY publish_time DESC, id DESC LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![symbol, start_time.to_rfc3339(), end_time.to_rfc3339(), limit.clamp(1, 20000)],
            Self::row_to_event,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_event(&self, source_name: &str, event_id: &str) -> Result<Option<EventRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, source_name, event_id, symbol, event_type, publish_time, effective_time,
                    polarity, score, confidence, title, summary, raw_ref, tags, metadata
             FROM event_records WHERE source_name = ?1 AND event_id = ?2",
            params![source_name, event_id],
            Self::row_to_event,
        )
        .optional()
        .context("fetching event")
    }

    fn row_to_event(r: &rusqlite::Row) -> rusqlite::Result<EventRecord> {
        let tags: String = r.get(13)?;
        let metadata: String = r.get(14)?;
        let polarity: String = r.get(7)?;
        Ok(EventRecord {
            id: r.get(0)?,
            source_name: r.get(1)?,
            event_id: r.get(2)?,
            symbol: r.get(3)?,
            event_type: r.get(4)?,
            publish_time: r.get::<_, String>(5)?.parse().unwrap(),
            effective_time: r.get::<_, Option<String>>(6)?.and_then(|s| s.parse().ok()),
            polarity: match polarity.as_str() {
                "POSITIVE" => EventPolarity::Positive,
                "NEGATIVE" => EventPolarity::Negative,
                _ => EventPolarity::Neutral,
            },
            score: r.get(8)?,
            confidence: r.get(9)?,
            title: r.get(10)?,
            summary: r.get(11)?,
            raw_ref: r.get(12)?,
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        })
    }
}
