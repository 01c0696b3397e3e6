//! Signal/execution replay storage. Grounded on `replay/store.py`: a signal is recorded once by
//! `(signal_id)`, zero or more executions are linked to it by FK, and `load_pairs`
//! left-joins the two for follow-rate/slippage/delay reporting.

use crate::domain::{ExecutionRecordCreate, ManualHoldingSide, SignalAction, SignalRecord};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SignalExecutionPair {
    pub signal_id: String,
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub signal_action: SignalAction,
    pub confidence: f64,
    pub executed_action: Option<ManualHoldingSide>,
    pub execution_date: Option<NaiveDate>,
    pub quantity: Option<i64>,
    pub price: Option<f64>,
}

pub struct ReplayStore {
    db_path: String,
}

impl ReplayStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = ReplayStore { db_path: db_path.to_string() };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening replay db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_records (
                signal_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                action TEXT NOT NULL,
                confidence REAL NOT NULL,
                reason TEXT NOT NULL,
                suggested_position REAL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS execution_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signal_id TEXT NOT NULL REFERENCES signal_records(signal_id),
                symbol TEXT NOT NULL,
                execution_date TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                fee REAL NOT NULL,
                note TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_exec_signal_id ON execution_records(signal_id)", [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signal_symbol_date ON signal_records(symbol, trade_date DESC)",
            [],
        )?;
        Ok(())
    }

    pub fn record_signal(&self, record: &SignalRecord) -> Result<String> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO signal_records
             (signal_id, symbol, strategy_name, trade_date, action, confidence, reason, suggested_position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.signal_id,
                record.symbol,
                record.strategy_name,
                record.trade_date.to_string(),
                record.action.as_str(),
                record.confidence,
                record.reason,
                record.suggested_position,
            ],
        )?;
        Ok(record.signal_id.clone())
    }

    pub fn signal_exists(&self, signal_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM signal_records WHERE signal_id = ?1 LIMIT 1", params![signal_id], |r| r.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn record_execution(&self, record: &ExecutionRecordCreate) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO execution_records
             (signal_id, symbol, execution_date, side, quantity, price, fee, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.signal_id,
                record.symbol,
                record.execution_date.to_string(),
                record.side.as_str(),
                record.quantity,
                record.price,
                record.fee,
                record.note,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_signals(&self, symbol: Option<&str>, limit: i64) -> Result<Vec<SignalRecord>> {
        let conn = self.conn()?;
        let limit = limit.clamp(1, 2000);
        let mut stmt;
        let rows = if let Some(symbol) = symbol {
            stmt = conn.prepare(
                "SELECT signal_id, symbol, strategy_name, trade_date, action, confidence, reason, suggested_position
                 FROM signal_records WHERE symbol = ?1 ORDER BY trade_date DESC LIMIT ?2",
            )?;
            stmt.query_map(params![symbol, limit], row_to_signal)?.collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt = conn.prepare(
                "SELECT signal_id, symbol, strategy_name, trade_date, action, confidence, reason, suggested_position
                 FROM signal_records ORDER BY trade_date DESC LIMIT ?1",
            )?;
            stmt.query_map(params![limit], row_to_signal)?.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    /// Left join of signals to their (at most one reported) execution, for the
    /// follow-rate/slippage/delay report. A signal with multiple executions would
    /// only surface its first row here, mirroring the original's unaggregated join.
    pub fn load_pairs(
        &self,
        symbol: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        limit: i64,
    ) -> Result<Vec<SignalExecutionPair>> {
        let conn = self.conn()?;
        let mut sql = String::from(
            "SELECT s.signal_id, s.symbol, s.trade_date, s.action, s.confidence,
                    e.side, e.execution_date, e.quantity, e.price
             FROM signal_records s
             LEFT JOIN execution_records e ON s.signal_id = e.signal_id",
        );
        let mut conditions = Vec::new();
        if symbol.is_some() {
            conditions.push("s.symbol = ?");
        }
        if start_date.is_some() {
            conditions.push("s.trade_date >= ?");
        }
        if end_date.is_some() {
            conditions.push("s.trade_date <= ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY s.trade_date DESC LIMIT ?");

        let mut stmt = conn.prepare(&sql)?;
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(symbol) = symbol {
            bound.push(Box::new(symbol.to_string()));
        }
        if let Some(d) = start_date {
            bound.push(Box::new(d.to_string()));
        }
        if let Some(d) = end_date {
            bound.push(Box::new(d.to_string()));
        }
        bound.push(Box::new(limit.clamp(1, 2000)));
        let params_ref: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_ref.as_slice(), |r| {
            let action: String = r.get(3)?;
            let side: Option<String> = r.get(5)?;
            let exec_date: Option<String> = r.get(6)?;
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                action,
                r.get::<_, f64>(4)?,
                side,
                exec_date,
                r.get::<_, Option<i64>>(7)?,
                r.get::<_, Option<f64>>(8)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (signal_id, symbol, trade_date, action, confidence, side, exec_date, quantity, price) = row?;
            out.push(SignalExecutionPair {
                signal_id,
                symbol,
                trade_date: trade_date.parse().unwrap(),
                signal_action: SignalAction::parse(&action).unwrap_or(SignalAction::Watch),
                confidence,
                executed_action: side.as_deref().and_then(ManualHoldingSide::parse),
                execution_date: exec_date.and_then(|d| d.parse().ok()),
                quantity,
                price,
            });
        }
        Ok(out)
    }
}

fn row_to_signal(r: &rusqlite::Row) -> rusqlite::Result<SignalRecord> {
    let action: String = r.get(4)?;
    Ok(SignalRecord {
        signal_id: r.get(0)?,
        symbol: r.get(1)?,
        strategy_name: r.get(2)?,
        trade_date: r.get::<_, String>(3)?.parse().unwrap(),
        action: SignalAction::parse(&action).unwrap_or(SignalAction::Watch),
        confidence: r.get(5)?,
        reason: r.get(6)?,
        suggested_position: r.get(7)?,
    })
}
