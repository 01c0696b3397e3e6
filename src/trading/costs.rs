//! Trading cost and edge estimation. Grounded on
//! `trading/costs.py`: commission + transfer fee + stamp duty + two-sided slippage,
//! expressed in basis points of notional.

fn calc_commission(notional: f64, rate: f64, min_commission: f64) -> f64 {
    if notional <= 0.0 {
        return 0.0;
    }
    (notional * rate).max(min_commission)
}

fn calc_transfer_fee(notional: f64, rate: f64) -> f64 {
    if notional <= 0.0 {
        return 0.0;
    }
    notional * rate
}

fn calc_stamp_duty(notional: f64, sell_rate: f64, is_sell: bool) -> f64 {
    if notional <= 0.0 || !is_sell {
        return 0.0;
    }
    notional * sell_rate
}

#[allow(clippy::too_many_arguments)]
fn calc_side_fee(
    notional: f64,
    commission_rate: f64,
    min_commission: f64,
    transfer_fee_rate: f64,
    stamp_duty_sell_rate: f64,
    is_sell: bool,
) -> f64 {
    if notional <= 0.0 {
        return 0.0;
    }
    calc_commission(notional, commission_rate, min_commission)
        + calc_transfer_fee(notional, transfer_fee_rate)
        + calc_stamp_duty(notional, stamp_duty_sell_rate, is_sell)
}

#[allow(clippy::too_many_arguments)]
pub fn estimate_roundtrip_cost_bps(
    price: f64,
    lot_size: i64,
    commission_rate: f64,
    min_commission: f64,
    transfer_fee_rate: f64,
    stamp_duty_sell_rate: f64,
    slippage_rate: f64,
) -> f64 {
    if price <= 0.0 || lot_size <= 0 {
        return 0.0;
    }
    let notional = price * lot_size as f64;
    let buy_fee = calc_side_fee(notional, commission_rate, min_commission, transfer_fee_rate, stamp_duty_sell_rate, false);
    let sell_fee = calc_side_fee(notional, commission_rate, min_commission, transfer_fee_rate, stamp_duty_sell_rate, true);
    let slip_cost = notional * slippage_rate.max(0.0) * 2.0;
    (buy_fee + sell_fee + slip_cost) / notional * 10_000.0
}

pub fn required_cash_for_min_lot(
    price: f64,
    lot_size: i64,
    commission_rate: f64,
    min_commission: f64,
    transfer_fee_rate: f64,
) -> f64 {
    if price <= 0.0 || lot_size <= 0 {
        return 0.0;
    }
    let notional = price * lot_size as f64;
    let buy_fee = calc_side_fee(notional, commission_rate, min_commission, transfer_fee_rate, 0.0, false);
    notional + buy_fee
}

/// Confidence-anchored edge estimate, nudged by momentum/event/fundamental context
/// when available. Never negative: a WATCH-worthy signal has zero expected edge,
/// not a penalty.
pub fn infer_expected_edge_bps(
    confidence: f64,
    momentum20: Option<f64>,
    event_score: Option<f64>,
    fundamental_score: Option<f64>,
) -> f64 {
    let c = confidence.clamp(0.0, 1.0);
    let mut base = ((c - 0.5) * 400.0).max(0.0);
    if let Some(m) = momentum20.filter(|v| v.is_finite()) {
        base += (m * 300.0).clamp(-80.0, 120.0);
    }
    if let Some(e) = event_score.filter(|v| v.is_finite()) {
        base += ((e - 0.5) * 200.0).clamp(0.0, 80.0);
    }
    if let Some(f) = fundamental_score.filter(|v| v.is_finite()) {
        base += ((f - 0.5) * 120.0).clamp(-40.0, 60.0);
    }
    base.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_cost_is_zero_for_invalid_inputs() {
        assert_eq!(estimate_roundtrip_cost_bps(0.0, 100, 0.00025, 5.0, 0.00002, 0.0005, 0.001), 0.0);
        assert_eq!(estimate_roundtrip_cost_bps(10.0, 0, 0.00025, 5.0, 0.00002, 0.0005, 0.001), 0.0);
    }

    #[test]
    fn min_commission_floor_applies_to_small_notional() {
        let required = required_cash_for_min_lot(1.0, 100, 0.00025, 5.0, 0.00002);
        // notional=100, commission floors at 5.0 rather than 100*0.00025=0.025
        assert!((required - (100.0 + 5.0 + 100.0 * 0.00002)).abs() < 1e-9);
    }

    #[test]
    fn expected_edge_never_negative() {
        assert_eq!(infer_expected_edge_bps(0.0, Some(-1.0), None, None), 0.0);
    }
}
