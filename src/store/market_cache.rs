//! Local timeseries cache store. Grounded on `data/cache_store.py`.
//! Bars are upserted by (provider, symbol, trade_date); `trade_date_range` backs the
//! gap-detection logic in `data::cache::LocalTimeseriesCache`.

use crate::domain::Bar;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};

pub struct MarketCacheStore {
    db_path: String,
}

impl MarketCacheStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = MarketCacheStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening market cache db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS bars (
                provider TEXT NOT NULL,
                symbol TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                amount REAL NOT NULL,
                is_suspended INTEGER NOT NULL,
                is_st INTEGER NOT NULL,
                announce_date TEXT,
                PRIMARY KEY (provider, symbol, trade_date)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bars_symbol_date ON bars(symbol, trade_date)",
            [],
        )?;
        Ok(())
    }

    pub fn upsert_bars(&self, provider: &str, bars: &[Bar]) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut count = 0i64;
        for bar in bars {
            tx.execute(
                "INSERT INTO bars(provider, symbol, trade_date, open, high, low, close, volume, amount, is_suspended, is_st, announce_date)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)
                 ON CONFLICT(provider, symbol, trade_date) DO UPDATE SET
                    open=excluded.open, high=excluded.high, low=excluded.low, close=excluded.close,
                    volume=excluded.volume, amount=excluded.amount, is_suspended=excluded.is_suspended,
                    is_st=excluded.is_st, announce_date=excluded.announce_date",
                params![
                    provider, bar.symbol, bar.trade_date.to_string(), bar.open, bar.high, bar.low,
                    bar.close, bar.volume, bar.amount, bar.is_suspended as i64, bar.is_st as i64,
                    bar.announce_date.map(|d| d.to_string())
                ],
            )?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn bars_between(
        &self,
        provider: &str,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT symbol, trade_date, open, high, low, close, volume, amount, is_suspended, is_st, announce_date
             FROM bars WHERE provider = ?1 AND symbol = ?2 AND trade_date >= ?3 AND trade_date <= ?4
             ORDER BY trade_date ASC",
        )?;
        let rows = stmt.query_map(
            params![provider, symbol, start_date.to_string(), end_date.to_string()],
            Self::row_to_bar,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Distinct trade dates present for (provider, symbol) within the window, sorted
    /// ascending. Gap detection compares this set against the trade calendar.
    pub fn trade_date_range(
        &self,
        provider: &str,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT trade_date FROM bars WHERE provider = ?1 AND symbol = ?2
             AND trade_date >= ?3 AND trade_date <= ?4 ORDER BY trade_date ASC",
        )?;
        let rows = stmt.query_map(
            params![provider, symbol, start_date.to_string(), end_date.to_string()],
            |r| r.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?.parse().unwrap());
        }
        Ok(out)
    }

    fn row_to_bar(r: &rusqlite::Row) -> rusqlite::Result<Bar> {
        Ok(Bar {
            symbol: r.get(0)?,
            trade_date: r.get::<_, String>(1)?.parse().unwrap(),
            open: r.get(2)?,
            high: r.get(3)?,
            low: r.get(4)?,
            close: r.get(5)?,
            volume: r.get(6)?,
            amount: r.get(7)?,
            is_suspended: r.get::<_, i64>(8)? != 0,
            is_st: r.get::<_, i64>(9)? != 0,
            announce_date: r.get::<_, Option<String>>(10)?.and_then(|s| s.parse().ok()),
        })
    }
}
