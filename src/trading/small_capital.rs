//! Affordability-aware overrides for small accounts.
//! Grounded on `trading/small_capital.py`: a BUY candidate too large for one account
//! is downgraded to WATCH rather than risked half-filled.

use crate::domain::{GeneratedSignal, SignalAction};
use crate::trading::costs::required_cash_for_min_lot;
use serde_json::json;

#[allow(clippy::too_many_arguments)]
pub fn apply_small_capital_overrides(
    signal: &mut GeneratedSignal,
    enable_small_capital_mode: bool,
    principal: f64,
    latest_price: f64,
    lot_size: i64,
    commission_rate: f64,
    min_commission: f64,
    transfer_fee_rate: f64,
    cash_buffer_ratio: f64,
    max_single_position: f64,
    max_positions: i64,
) -> Option<String> {
    if !enable_small_capital_mode || signal.action != SignalAction::Buy {
        return None;
    }
    if principal <= 0.0 || latest_price <= 0.0 || lot_size <= 0 {
        return Some("Small-capital override skipped due to invalid principal/price/lot_size.".to_string());
    }

    let usable_cash = principal * (1.0 - cash_buffer_ratio).max(0.0);
    let min_lot_cash = required_cash_for_min_lot(latest_price, lot_size, commission_rate, min_commission, transfer_fee_rate);
    let min_lot_position = latest_price * lot_size as f64 / principal;

    if min_lot_cash > usable_cash {
        signal.action = SignalAction::Watch;
        signal.suggested_position = None;
        signal.reason = format!(
            "{} [small-capital override] Not enough usable cash for one lot: {:.2} < {:.2}.",
            signal.reason, usable_cash, min_lot_cash
        );
        signal.metadata.insert("small_capital_override".to_string(), json!("downgraded_not_affordable"));
        return Some(signal.reason.clone());
    }

    if min_lot_position > max_single_position {
        signal.action = SignalAction::Watch;
        signal.suggested_position = None;
        signal.reason = format!(
            "{} [small-capital override] One-lot position ratio {:.2}% exceeds max_single_position {:.2}%.",
            signal.reason,
            min_lot_position * 100.0,
            max_single_position * 100.0
        );
        signal.metadata.insert("small_capital_override".to_string(), json!("downgraded_over_concentrated"));
        return Some(signal.reason.clone());
    }

    let budget_position = usable_cash / (max_positions.max(1) as f64) / principal;
    let suggested = signal.suggested_position.unwrap_or(budget_position);
    let suggested = suggested.max(min_lot_position).min(max_single_position);
    signal.suggested_position = Some((suggested * 10_000.0).round() / 10_000.0);
    signal.metadata.insert("small_capital_override".to_string(), json!("position_adjusted"));
    signal
        .metadata
        .insert("small_capital_min_lot_position".to_string(), json!((min_lot_position * 100_000.0).round() / 100_000.0));
    signal
        .metadata
        .insert("small_capital_budget_position".to_string(), json!((budget_position * 100_000.0).round() / 100_000.0));
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn base_signal() -> GeneratedSignal {
        GeneratedSignal {
            symbol: "600000.SH".to_string(),
            strategy_name: "demo".to_string(),
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            action: SignalAction::Buy,
            confidence: 0.8,
            reason: "momentum breakout".to_string(),
            suggested_position: Some(0.2),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn downgrades_to_watch_when_unaffordable() {
        // principal=2000, price=120, lot=100 -> one lot costs ~12005, unaffordable
        let mut signal = base_signal();
        apply_small_capital_overrides(&mut signal, true, 2000.0, 120.0, 100, 0.00025, 5.0, 0.00002, 0.0, 1.0, 3);
        assert_eq!(signal.action, SignalAction::Watch);
        assert!(signal.reason.contains("Not enough usable cash for one lot"));
        assert!(signal.suggested_position.is_none());
    }

    #[test]
    fn adjusts_position_when_affordable() {
        let mut signal = base_signal();
        apply_small_capital_overrides(&mut signal, true, 50_000.0, 10.0, 100, 0.00025, 5.0, 0.00002, 0.1, 0.3, 3);
        assert_eq!(signal.action, SignalAction::Buy);
        assert!(signal.suggested_position.unwrap() > 0.0);
    }

    #[test]
    fn leaves_sell_signals_untouched() {
        let mut signal = base_signal();
        signal.action = SignalAction::Sell;
        let note = apply_small_capital_overrides(&mut signal, true, 2000.0, 120.0, 100, 0.00025, 5.0, 0.00002, 0.0, 1.0, 3);
        assert!(note.is_none());
        assert_eq!(signal.action, SignalAction::Sell);
    }
}
