//! `HoldingsService`: thin wrapper over `store::holdings` exposing the average-cost
//! position view RiskEngine and the API layer consume.

use crate::domain::ManualHoldingSide;
use crate::store::holdings::{HoldingLot, HoldingPosition, HoldingsStore};
use anyhow::Result;

pub struct HoldingsService {
    store: HoldingsStore,
}

impl HoldingsService {
    pub fn new(store: HoldingsStore) -> Self {
        HoldingsService { store }
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
        self.store.record_lot(symbol, side, quantity, price, trade_time, note)
    }

    pub fn position(&self, symbol: &str) -> Result<HoldingPosition> {
        self.store.position(symbol)
    }

    pub fn lots(&self, symbol: &str) -> Result<Vec<HoldingLot>> {
        self.store.lots_for_symbol(symbol)
    }

    pub fn all_positions(&self) -> Result<Vec<HoldingPosition>> {
        let symbols = self.store.all_symbols()?;
        symbols.iter().map(|s| self.store.position(s)).collect()
    }
}
