//! Per-field data quality scoring on bar frames. Grounded on
//! `governance/data_quality.py`.

use crate::domain::{Bar, RuleHit, SignalLevel};
use crate::util::clamp01;

#[derive(Debug, Clone)]
pub struct DataQualityReport {
    pub passed: bool,
    pub score: f64,
    pub issues: Vec<RuleHit>,
    pub field_scores: Vec<(String, f64)>,
}

const PRICE_VOLUME_FIELDS: &[&str] = &["open", "high", "low", "close", "volume", "amount"];

pub struct DataQualityService;

impl DataQualityService {
    pub fn evaluate(bars: &[Bar]) -> DataQualityReport {
        let mut issues = Vec::new();

        if bars.is_empty() {
            issues.push(RuleHit::fail("empty_dataset", SignalLevel::Critical, "bar frame is empty"));
            return DataQualityReport {
                passed: false,
                score: 0.0,
                issues,
                field_scores: Vec::new(),
            };
        }

        let mut seen_dates = std::collections::HashSet::new();
        let mut duplicate = false;
        for bar in bars {
            if !seen_dates.insert(bar.trade_date) {
                duplicate = true;
            }
        }
        if duplicate {
            issues.push(RuleHit::fail(
                "duplicate_trade_date",
                SignalLevel::Warning,
                "duplicate trade_date values present",
            ));
        }

        let mut invalid_high_low = false;
        for bar in bars {
            if bar.high < bar.low {
                invalid_high_low = true;
            }
        }
        if invalid_high_low {
            issues.push(RuleHit::fail(
                "invalid_high_low",
                SignalLevel::Critical,
                "at least one row has high < low",
            ));
        }

        let n = bars.len() as f64;
        let mut field_scores = Vec::new();
        for field in PRICE_VOLUME_FIELDS {
            let (null_count, invalid_count, non_positive_count) = field_stats(bars, field);
            let null_ratio = null_count as f64 / n;
            let invalid_ratio = invalid_count as f64 / n;
            let non_positive_ratio = non_positive_count as f64 / n;
            let score = clamp01(1.0 - null_ratio - 0.5 * invalid_ratio - 0.3 * non_positive_ratio);
            field_scores.push((field.to_string(), score));
            if null_count > 0 {
                issues.push(RuleHit::fail(
                    &format!("null_{field}"),
                    SignalLevel::Warning,
                    format!("{null_count} rows missing {field}"),
                ));
            }
        }

        let passed = !issues.iter().any(|i| i.level == SignalLevel::Critical);
        let score = if field_scores.is_empty() {
            0.0
        } else {
            field_scores.iter().map(|(_, s)| s).sum::<f64>() / field_scores.len() as f64
        };

        DataQualityReport {
            passed,
            score,
            issues,
            field_scores,
        }
    }
}

/// OHLCVA fields in `Bar` are plain f64 (never truly null in this schema), so the
/// "invalid/non-positive" checks apply to values that would be nonsensical for a
/// price or volume column. NaN stands in for "missing" since the in-memory `Bar`
/// has no null representation for these columns.
fn field_stats(bars: &[Bar], field: &str) -> (usize, usize, usize) {
    let mut null_count = 0;
    let mut invalid_count = 0;
    let mut non_positive_count = 0;
    for bar in bars {
        let value = match field {
            "open" => bar.open,
            "high" => bar.high,
            "low" => bar.low,
            "close" => bar.close,
            "volume" => bar.volume,
            "amount" => bar.amount,
            _ => continue,
        };
        if value.is_nan() {
            null_count += 1;
            continue;
        }
        if !value.is_finite() {
            invalid_count += 1;
            continue;
        }
        if value <= 0.0 {
            non_positive_count += 1;
        }
    }
    (null_count, invalid_count, non_positive_count)
}
