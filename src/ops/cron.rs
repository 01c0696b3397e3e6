//! 5-field POSIX cron parser. Grounded on `ops/cron.py`. Each field
//! expands to the explicit set of matching values; day-of-month and day-of-week
//! combine with the standard OR rule when both are restricted (not `*`).

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct CronSchedule {
    minute: BTreeSet<u32>,
    hour: BTreeSet<u32>,
    dom: BTreeSet<u32>,
    month: BTreeSet<u32>,
    dow: BTreeSet<u32>,
    dom_is_any: bool,
    dow_is_any: bool,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(anyhow!("cron expression must have 5 fields, got {}", fields.len()));
        }
        let minute = expand_field(fields[0], 0, 59)?;
        let hour = expand_field(fields[1], 0, 23)?;
        let dom = expand_field(fields[2], 1, 31)?;
        let month = expand_field(fields[3], 1, 12)?;
        let mut dow = expand_field(fields[4], 0, 7)?;
        if dow.remove(&7) {
            dow.insert(0);
        }
        Ok(CronSchedule {
            minute,
            hour,
            dom,
            month,
            dow,
            dom_is_any: fields[2].trim() == "*",
            dow_is_any: fields[4].trim() == "*",
        })
    }

    /// `as_of` must already be truncated to the minute in the scheduler's timezone.
    pub fn matches(&self, as_of: DateTime<Utc>) -> bool {
        if !self.minute.contains(&as_of.minute()) || !self.hour.contains(&as_of.hour()) {
            return false;
        }
        if !self.month.contains(&as_of.month()) {
            return false;
        }
        let dom_ok = self.dom.contains(&as_of.day());
        let dow_value = as_of.weekday().num_days_from_sunday();
        let dow_ok = self.dow.contains(&dow_value);

        if self.dom_is_any && self.dow_is_any {
            true
        } else if self.dom_is_any {
            dow_ok
        } else if self.dow_is_any {
            dom_ok
        } else {
            dom_ok || dow_ok
        }
    }

    /// Steps backward minute by minute from `as_of` (inclusive) to find the most
    /// recent matching time, bounded to avoid runaway scans on a malformed cron.
    pub fn previous_at_or_before(&self, as_of: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut cursor = as_of;
        for _ in 0..(366 * 24 * 60) {
            if self.matches(cursor) {
                return Some(cursor);
            }
            cursor -= chrono::Duration::minutes(1);
        }
        None
    }
}

fn expand_field(raw: &str, min: u32, max: u32) -> Result<BTreeSet<u32>> {
    let mut out = BTreeSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (range_part, step) = match part.split_once('/') {
            Some((r, s)) => (r, s.parse::<u32>().map_err(|_| anyhow!("invalid step in '{part}'"))?),
            None => (part, 1),
        };
        if step == 0 {
            return Err(anyhow!("step must be > 0 in '{part}'"));
        }
        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let a: u32 = a.parse().map_err(|_| anyhow!("invalid range start in '{part}'"))?;
            let b: u32 = b.parse().map_err(|_| anyhow!("invalid range end in '{part}'"))?;
            (a, b)
        } else {
            let v: u32 = range_part.parse().map_err(|_| anyhow!("invalid value '{range_part}'"))?;
            (v, v)
        };
        if lo < min || hi > max || lo > hi {
            return Err(anyhow!("field value out of range in '{part}' (expected {min}-{max})"));
        }
        let mut v = lo;
        while v <= hi {
            out.insert(v);
            v += step;
        }
    }
    if out.is_empty() {
        return Err(anyhow!("cron field '{raw}' expanded to an empty set"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_five_minutes_matches_only_multiples_of_five() {
        let cron = CronSchedule::parse("*/5 * * * *").unwrap();
        assert!(cron.matches(Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap()));
        assert!(!cron.matches(Utc.with_ymd_and_hms(2024, 1, 1, 10, 7, 0).unwrap()));
    }

    #[test]
    fn dom_or_dow_rule_matches_if_either_restricted_field_hits() {
        // 1st of the month OR any Monday, at 09:00.
        let cron = CronSchedule::parse("0 9 1 * 1").unwrap();
        let first_of_month_tuesday = Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap();
        assert!(cron.matches(first_of_month_tuesday));
        let some_monday = Utc.with_ymd_and_hms(2024, 10, 7, 9, 0, 0).unwrap();
        assert!(cron.matches(some_monday));
        let neither = Utc.with_ymd_and_hms(2024, 10, 8, 9, 0, 0).unwrap();
        assert!(!cron.matches(neither));
    }

    #[test]
    fn dow_seven_is_equivalent_to_sunday() {
        let cron = CronSchedule::parse("0 0 * * 7").unwrap();
        let sunday = Utc.with_ymd_and_hms(2024, 10, 6, 0, 0, 0).unwrap();
        assert!(cron.matches(sunday));
    }
}
