//! Technical + fundamental factor computation. Grounded on
//! `factors/engine.py`; per-symbol frames are computed in parallel with `rayon`.

use crate::domain::Bar;
use crate::fundamentals::EnrichedBar;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FactorRow {
    pub symbol: String,
    pub trade_date: chrono::NaiveDate,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub atr14: Option<f64>,
    pub ret_1d: Option<f64>,
    pub momentum20: Option<f64>,
    pub momentum60: Option<f64>,
    pub volatility20: Option<f64>,
    pub zscore20: Option<f64>,
    pub turnover20: Option<f64>,
    pub fundamental_available: bool,
    pub fundamental_score: Option<f64>,
    pub tushare_advanced_score: Option<f64>,
    pub tushare_disclosure_risk_score: Option<f64>,
    pub tushare_overhang_risk_score: Option<f64>,
}

pub struct FactorEngine;

impl FactorEngine {
    pub fn compute_many(frames: &HashMap<String, Vec<Bar>>) -> HashMap<String, Vec<FactorRow>> {
        frames
            .par_iter()
            .map(|(symbol, bars)| (symbol.clone(), Self::compute_one(bars, None)))
            .collect()
    }

    /// Computes the factor series for one symbol's bar frame (assumed sorted
    /// ascending by trade_date). Never raises on missing columns — everything
    /// fundamentals-related is `Option`/defaulted to neutral.
    pub fn compute_one(bars: &[Bar], enriched: Option<&[EnrichedBar]>) -> Vec<FactorRow> {
        let n = bars.len();
        let mut rows = Vec::with_capacity(n);

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let amounts: Vec<f64> = bars.iter().map(|b| b.amount).collect();

        let atr = wilder_atr14(&highs, &lows, &closes);

        for i in 0..n {
            let ma5 = moving_average(&closes, i, 5);
            let ma20 = moving_average(&closes, i, 20);
            let ma60 = moving_average(&closes, i, 60);

            let ret_1d = if i >= 1 && closes[i - 1] != 0.0 {
                Some(closes[i] / closes[i - 1] - 1.0)
            } else {
                None
            };
            let momentum20 = if i >= 20 && closes[i - 20] != 0.0 {
                Some(closes[i] / closes[i - 20] - 1.0)
            } else {
                None
            };
            let momentum60 = if i >= 60 && closes[i - 60] != 0.0 {
                Some(closes[i] / closes[i - 60] - 1.0)
            } else {
                None
            };

            let volatility20 = rolling_returns_stdev(&closes, i, 20);
            let zscore20 = rolling_zscore(&closes, i, 20, ma20);
            let turnover20 = moving_average(&amounts, i, 20);

            let (fundamental_available, fundamental_score) = enriched
                .and_then(|e| e.get(i))
                .map(|e| (e.fundamental_available, fundamental_score_from(e)))
                .unwrap_or((false, Some(0.5)));

            rows.push(FactorRow {
                symbol: bars[i].symbol.clone(),
                trade_date: bars[i].trade_date,
                ma5,
                ma20,
                ma60,
                atr14: atr.get(i).copied().flatten(),
                ret_1d,
                momentum20,
                momentum60,
                volatility20,
                zscore20,
                turnover20,
                fundamental_available,
                fundamental_score,
                tushare_advanced_score: None,
                tushare_disclosure_risk_score: None,
                tushare_overhang_risk_score: None,
            });
        }
        rows
    }
}

fn fundamental_score_from(e: &EnrichedBar) -> Option<f64> {
    if !e.fundamental_available {
        return Some(0.5);
    }
    let profitability = e.roe.map(|v| (v / 0.30).clamp(0.0, 1.0)).unwrap_or(0.5);
    let growth = e
        .revenue_yoy
        .or(e.net_profit_yoy)
        .map(|v| ((v + 0.20) / 0.60).clamp(0.0, 1.0))
        .unwrap_or(0.5);
    let quality = e.gross_margin.map(|v| v.clamp(0.0, 1.0)).unwrap_or(0.5);
    let leverage = e.debt_to_asset.map(|v| (1.0 - v).clamp(0.0, 1.0)).unwrap_or(0.5);
    let mut score = 0.30 * profitability + 0.25 * growth + 0.25 * quality + 0.20 * leverage;
    if e.fundamental_is_stale || !e.fundamental_pit_ok {
        score *= 0.6;
    }
    Some(score.clamp(0.0, 1.0))
}

fn moving_average(values: &[f64], i: usize, window: usize) -> Option<f64> {
    if i + 1 < window {
        return None;
    }
    let slice = &values[i + 1 - window..=i];
    Some(slice.iter().sum::<f64>() / window as f64)
}

fn rolling_returns_stdev(closes: &[f64], i: usize, window: usize) -> Option<f64> {
    if i + 1 < window + 1 {
        return None;
    }
    let mut returns = Vec::with_capacity(window);
    for k in (i + 1 - window)..=i {
        if closes[k - 1] == 0.0 {
            return None;
        }
        returns.push(closes[k] / closes[k - 1] - 1.0);
    }
    Some(returns.population_std_dev())
}

fn rolling_zscore(closes: &[f64], i: usize, window: usize, ma20: Option<f64>) -> Option<f64> {
    if i + 1 < window {
        return None;
    }
    let ma = ma20?;
    let slice: Vec<f64> = closes[i + 1 - window..=i].to_vec();
    let stdev = slice.population_std_dev();
    if stdev == 0.0 {
        return None;
    }
    Some((closes[i] - ma) / stdev)
}

/// Wilder's smoothed ATR14: the first value is a plain 14-period average of true
/// range, every subsequent value blends in the new true range at weight 1/14.
fn wilder_atr14(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
    let n = highs.len();
    let mut out = vec![None; n];
    if n == 0 {
        return out;
    }
    let mut true_ranges = vec![0.0; n];
    true_ranges[0] = highs[0] - lows[0];
    for i in 1..n {
        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());
        true_ranges[i] = tr;
    }
    const PERIOD: usize = 14;
    if n < PERIOD {
        return out;
    }
    let mut atr = true_ranges[0..PERIOD].iter().sum::<f64>() / PERIOD as f64;
    out[PERIOD - 1] = Some(atr);
    for i in PERIOD..n {
        atr = (atr * (PERIOD - 1) as f64 + true_ranges[i]) / PERIOD as f64;
        out[i] = Some(atr);
    }
    out
}
