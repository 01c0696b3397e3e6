//! `ReplayService`. Grounded on
//! `replay/service.py`: records signal decisions, links executions against them by
//! id, and reports follow-rate/slippage/delay over the joined pairs.

use crate::domain::{ExecutionRecordCreate, ExecutionReplayItem, ExecutionReplayReport, SignalRecord};
use crate::store::replay::ReplayStore;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;

pub struct ReplayService {
    store: ReplayStore,
}

impl ReplayService {
    pub fn new(store: ReplayStore) -> Self {
        ReplayService { store }
    }

    pub fn record_signal(&self, record: &SignalRecord) -> Result<String> {
        self.store.record_signal(record)
    }

    pub fn record_execution(&self, record: &ExecutionRecordCreate) -> Result<i64> {
        if !self.store.signal_exists(&record.signal_id)? {
            return Err(anyhow!("signal_id '{}' not found", record.signal_id));
        }
        self.store.record_execution(record)
    }

    pub fn list_signals(&self, symbol: Option<&str>, limit: i64) -> Result<Vec<SignalRecord>> {
        self.store.list_signals(symbol, limit)
    }

    /// Without a reference execution price from the order book, slippage is
    /// reported as a flat zero baseline (mirrors the original's documented
    /// limitation rather than fabricating a benchmark price).
    pub fn report(
        &self,
        symbol: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        limit: i64,
    ) -> Result<ExecutionReplayReport> {
        let pairs = self.store.load_pairs(symbol, start_date, end_date, limit)?;

        let mut items = Vec::with_capacity(pairs.len());
        let mut followed_count = 0i64;
        let mut slippage_sum = 0.0;
        let mut slippage_count = 0i64;
        let mut delay_sum = 0i64;
        let mut delay_count = 0i64;

        for pair in pairs {
            let executed_action = pair.executed_action.map(|s| s.as_signal_action());
            let quantity = pair.quantity.unwrap_or(0);
            let followed = executed_action == Some(pair.signal_action) && quantity > 0;
            if followed {
                followed_count += 1;
            }

            let slippage_bps = 0.0;
            if quantity > 0 {
                slippage_sum += slippage_bps;
                slippage_count += 1;
            }

            let exec_date = pair.execution_date.unwrap_or(pair.trade_date);
            let delay_days = if quantity > 0 { (exec_date - pair.trade_date).num_days().max(0) } else { 0 };
            if quantity > 0 {
                delay_sum += delay_days;
                delay_count += 1;
            }

            items.push(ExecutionReplayItem {
                signal_id: pair.signal_id,
                symbol: pair.symbol,
                signal_action: pair.signal_action,
                executed_action,
                signal_confidence: pair.confidence,
                executed_quantity: quantity,
                executed_price: pair.price.unwrap_or(0.0),
                slippage_bps,
                followed,
                delay_days,
            });
        }

        let total = items.len() as f64;
        let follow_rate = if total == 0.0 { 0.0 } else { followed_count as f64 / total };
        let avg_slippage_bps = if slippage_count == 0 { 0.0 } else { slippage_sum / slippage_count as f64 };
        let avg_delay_days = if delay_count == 0 { 0.0 } else { delay_sum as f64 / delay_count as f64 };

        Ok(ExecutionReplayReport {
            items,
            follow_rate: (follow_rate * 1_000_000.0).round() / 1_000_000.0,
            avg_slippage_bps: (avg_slippage_bps * 1_000_000.0).round() / 1_000_000.0,
            avg_delay_days: (avg_delay_days * 1_000_000.0).round() / 1_000_000.0,
        })
    }
}
