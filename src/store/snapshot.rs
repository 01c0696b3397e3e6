//! Deduplicated content-hash registry of data ranges consumed by any downstream use.
//! Idempotent upsert on the natural key.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRecord {
    pub id: i64,
    pub dataset_name: String,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub provider: String,
    pub row_count: i64,
    pub schema_version: String,
    pub content_hash: String,
}

pub struct SnapshotStore {
    db_path: String,
}

impl SnapshotStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = SnapshotStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening snapshot db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dataset_name TEXT NOT NULL,
                symbol TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                provider TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                schema_version TEXT NOT NULL,
                content_hash TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshot_unique
             ON snapshots(dataset_name, symbol, start_date, end_date, provider, content_hash)",
            [],
        )?;
        Ok(())
    }

    pub fn register(
        &self,
        dataset_name: &str,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        provider: &str,
        row_count: i64,
        schema_version: &str,
        content_hash: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots(dataset_name, symbol, start_date, end_date, provider, row_count, schema_version, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(dataset_name, symbol, start_date, end_date, provider, content_hash)
             DO UPDATE SET row_count = excluded.row_count, schema_version = excluded.schema_version",
            params![
                dataset_name,
                symbol,
                start_date.to_string(),
                end_date.to_string(),
                provider,
                row_count,
                schema_version,
                content_hash
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM snapshots WHERE dataset_name=?1 AND symbol=?2 AND start_date=?3
             AND end_date=?4 AND provider=?5 AND content_hash=?6",
            params![
                dataset_name,
                symbol,
                start_date.to_string(),
                end_date.to_string(),
                provider,
                content_hash
            ],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<SnapshotRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, dataset_name, symbol, start_date, end_date, provider, row_count, schema_version, content_hash
             FROM snapshots WHERE id = ?1",
            params![id],
            |r| {
                Ok(SnapshotRecord {
                    id: r.get(0)?,
                    dataset_name: r.get(1)?,
                    symbol: r.get(2)?,
                    start_date: r.get::<_, String>(3)?.parse().unwrap(),
                    end_date: r.get::<_, String>(4)?.parse().unwrap(),
                    provider: r.get(5)?,
                    row_count: r.get(6)?,
                    schema_version: r.get(7)?,
                    content_hash: r.get(8)?,
                })
            },
        )
        .optional()
        .context("fetching snapshot")
    }
}
