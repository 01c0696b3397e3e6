//! Manual holdings ledger. Grounded on `holdings/store.py`.

use crate::domain::ManualHoldingSide;
use crate::util::now_iso;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HoldingLot {
    pub id: i64,
    pub symbol: String,
    pub side: ManualHoldingSide,
    pub quantity: i64,
    pub price: f64,
    pub trade_time: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HoldingPosition {
    pub symbol: String,
    pub net_quantity: i64,
    pub avg_cost: f64,
}

pub struct HoldingsStore {
    db_path: String,
}

impl HoldingsStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = HoldingsStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening holdings db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS holding_lots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                trade_time TEXT NOT NULL,
                note TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_holding_symbol ON holding_lots(symbol, trade_time)",
            [],
        )?;
        Ok(())
    }

    pub fn record_lot(
        &self,
        symbol: &str,
        side: ManualHoldingSide,
        quantity: i64,
        price: f64,
        trade_time: &str,
        note: &str,
    ) -> Result<i64> {
        let side_str = match side {
            ManualHoldingSide::Buy => "buy",
            ManualHoldingSide::Sell => "sell",
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO holding_lots(created_at, symbol, side, quantity, price, trade_time, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![now_iso(), symbol, side_str, quantity, price, trade_time, note],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn lots_for_symbol(&self, symbol: &str) -> Result<Vec<HoldingLot>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, symbol, side, quantity, price, trade_time, note
             FROM holding_lots WHERE symbol = ?1 ORDER BY trade_time ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![symbol], Self::row_to_lot)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Average-cost position for one symbol, FIFO-neutral running average per
    /// `holdings/store.py`: each buy lot re-weights the average cost, each sell lot
    /// reduces quantity without touching the average.
    pub fn position(&self, symbol: &str) -> Result<HoldingPosition> {
        let lots = self.lots_for_symbol(symbol)?;
        let mut qty: i64 = 0;
        let mut avg_cost: f64 = 0.0;
        for lot in &lots {
            match lot.side {
                ManualHoldingSide::Buy => {
                    let total_cost = avg_cost * qty as f64 + lot.price * lot.quantity as f64;
                    qty += lot.quantity;
                    avg_cost = if qty > 0 { total_cost / qty as f64 } else { 0.0 };
                }
                ManualHoldingSide::Sell => {
                    qty -= lot.quantity;
                    if qty <= 0 {
                        qty = qty.max(0);
                        avg_cost = 0.0;
                    }
                }
            }
        }
        Ok(HoldingPosition {
            symbol: symbol.to_string(),
            net_quantity: qty,
            avg_cost,
        })
    }

    pub fn all_symbols(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT symbol FROM holding_lots ORDER BY symbol")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn row_to_lot(r: &rusqlite::Row) -> rusqlite::Result<HoldingLot> {
        let side: String = r.get(2)?;
        Ok(HoldingLot {
            id: r.get(0)?,
            symbol: r.get(1)?,
            side: if side == "buy" {
                ManualHoldingSide::Buy
            } else {
                ManualHoldingSide::Sell
            },
            quantity: r.get(3)?,
            price: r.get(4)?,
            trade_time: r.get(5)?,
            note: r.get(6)?,
        })
    }
}

pub fn available_quantity(store: &HoldingsStore, symbol: &str) -> Result<i64> {
    Ok(store.position(symbol)?.net_quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HoldingsStore {
        let file = tempfile::NamedTempFile::new().unwrap();
        HoldingsStore::new(file.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn average_cost_reweights_on_buy_and_holds_through_sell() {
        let store = store();
        store
            .record_lot("000001", ManualHoldingSide::Buy, 100, 10.0, "2024-01-01T00:00:00Z", "")
            .unwrap();
        store
            .record_lot("000001", ManualHoldingSide::Buy, 100, 20.0, "2024-01-02T00:00:00Z", "")
            .unwrap();
        let pos = store.position("000001").unwrap();
        assert_eq!(pos.net_quantity, 200);
        assert!((pos.avg_cost - 15.0).abs() < 1e-9);

        store
            .record_lot("000001", ManualHoldingSide::Sell, 50, 25.0, "2024-01-03T00:00:00Z", "")
            .unwrap();
        let pos = store.position("000001").unwrap();
        assert_eq!(pos.net_quantity, 150);
        assert!((pos.avg_cost - 15.0).abs() < 1e-9);
    }
}
