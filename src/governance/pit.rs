//! Point-in-time (anti-lookahead) validation on bar frames and event joins.
//! Grounded on `governance/pit_validator.py`.

use crate::domain::{Bar, RuleHit, SignalLevel};
use chrono::{DateTime, NaiveDate, Utc};

pub struct PITValidator;

impl PITValidator {
    /// Validates a bar series against `as_of`: catches lookahead in the timeline
    /// itself (future dates, non-monotonic ordering) and, when present, in the
    /// `announce_date` column. `announce_date` is an optional column — not every
    /// bar frame carries it, and its absence is not itself an issue.
    pub fn validate_bars(bars: &[Bar], as_of: NaiveDate) -> Vec<RuleHit> {
        let mut hits = Vec::new();

        if bars.is_empty() {
            hits.push(RuleHit::fail("empty_bars", SignalLevel::Critical, "bar frame is empty"));
            return hits;
        }

        let mut seen = std::collections::HashSet::new();
        let mut duplicated = false;
        for bar in bars {
            if !seen.insert(bar.trade_date) {
                duplicated = true;
            }
        }
        if duplicated {
            hits.push(RuleHit::fail(
                "duplicated_trade_date",
                SignalLevel::Warning,
                "bar frame contains duplicate trade_date values",
            ));
        }

        let mut non_monotonic = false;
        for window in bars.windows(2) {
            if window[1].trade_date < window[0].trade_date {
                non_monotonic = true;
            }
        }
        if non_monotonic {
            hits.push(RuleHit::fail(
                "non_monotonic_trade_date",
                SignalLevel::Critical,
                "bar frame is not sorted ascending by trade_date",
            ));
        }

        if bars.iter().any(|b| b.trade_date > as_of) {
            hits.push(RuleHit::fail(
                "future_trade_date",
                SignalLevel::Critical,
                "bar frame contains a trade_date beyond as_of",
            ));
        }

        for bar in bars {
            if let Some(announce) = bar.announce_date {
                if announce > bar.trade_date {
                    hits.push(RuleHit::fail(
                        "announce_after_trade_date",
                        SignalLevel::Critical,
                        format!("{}: announce_date {} is after trade_date {}", bar.symbol, announce, bar.trade_date),
                    ));
                }
            }
        }

        if hits.is_empty() {
            hits.push(RuleHit::ok("bars_pit", "bar frame passes PIT checks"));
        }
        hits
    }

    /// Validates one event join against the trade time it was used at.
    pub fn validate_event_join(
        used_in_trade_time: DateTime<Utc>,
        publish_time: DateTime<Utc>,
        effective_time: Option<DateTime<Utc>>,
    ) -> Vec<RuleHit> {
        let mut hits = Vec::new();
        if used_in_trade_time < publish_time {
            hits.push(RuleHit::fail(
                "used_before_publish",
                SignalLevel::Critical,
                "event was used before its publish_time",
            ));
        }
        if let Some(effective) = effective_time {
            if used_in_trade_time < effective {
                hits.push(RuleHit::fail(
                    "used_before_effective",
                    SignalLevel::Warning,
                    "event was used before its effective_time",
                ));
            }
            if effective < publish_time {
                hits.push(RuleHit::fail(
                    "effective_before_publish",
                    SignalLevel::Warning,
                    "effective_time precedes publish_time",
                ));
            }
        }
        if hits.is_empty() {
            hits.push(RuleHit::ok("event_join_pit", "event join passes PIT checks"));
        }
        hits
    }
}
