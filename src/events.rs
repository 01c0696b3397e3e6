//! Corporate event ingest, PIT-join validation, and bar enrichment.
//! Wraps `store::event`; the decay feature builder is grounded on
//! `governance/event_store.py`'s `build_event_features`.

use crate::domain::{EventPolarity, EventRecord, RuleHit};
use crate::governance::pit::PITValidator;
use crate::store::event::{EventRecordCreate, EventSource, EventStore};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EventFeatureTriple {
    pub event_score: f64,
    pub negative_event_score: f64,
    pub positive_count: u32,
    pub negative_count: u32,
    pub neutral_count: u32,
}

pub struct EventService {
    store: EventStore,
}

impl EventService {
    pub fn new(store: EventStore) -> Self {
        EventService { store }
    }

    pub fn register_source(&self, source: &EventSource) -> Result<i64> {
        self.store.register_source(source)
    }

    pub fn ingest_batch(&self, source_name: &str, events: &[EventRecordCreate]) -> Result<(i64, i64, Vec<String>)> {
        self.store.ingest_batch(source_name, events)
    }

    /// Resolves the referenced event by (source, event_id) and runs the PIT join
    /// diagnostics against the time it was actually used at.
    pub fn validate_join(
        &self,
        source_name: &str,
        event_id: &str,
        used_in_trade_time: DateTime<Utc>,
    ) -> Result<Vec<RuleHit>> {
        let event = self.store.get_event(source_name, event_id)?;
        let Some(event) = event else {
            return Ok(vec![RuleHit::fail(
                "event_not_found",
                crate::domain::SignalLevel::Critical,
                format!("no event {event_id} from source {source_name}"),
            )]);
        };
        Ok(PITValidator::validate_event_join(
            used_in_trade_time,
            event.publish_time,
            event.effective_time,
        ))
    }

    /// Exponential-decay sentiment feature for the window `(day_end - lookback_days, day_end]`.
    pub fn build_event_features(
        events: &[EventRecord],
        day_end: DateTime<Utc>,
        lookback_days: i64,
        half_life_days: f64,
    ) -> EventFeatureTriple {
        let window_start = day_end - chrono::Duration::days(lookback_days);
        let lambda = std::f64::consts::LN_2 / half_life_days.max(1e-6);

        let mut positive = 0.0f64;
        let mut negative = 0.0f64;
        let mut positive_count = 0u32;
        let mut negative_count = 0u32;
        let mut neutral_count = 0u32;

        for event in events {
            if event.publish_time <= window_start || event.publish_time > day_end {
                continue;
            }
            let age_seconds = (day_end - event.publish_time).num_seconds().max(0) as f64;
            let age_days = age_seconds / 86_400.0;
            let base = event.score.clamp(0.0, 1.0) * event.confidence.clamp(0.0, 1.0) * (-lambda * age_days).exp();
            match event.polarity {
                EventPolarity::Positive => {
                    positive += base;
                    positive_count += 1;
                }
                EventPolarity::Negative => {
                    negative += base;
                    negative_count += 1;
                }
                EventPolarity::Neutral => neutral_count += 1,
            }
        }

        EventFeatureTriple {
            event_score: positive.min(1.0),
            negative_event_score: negative.min(1.0),
            positive_count,
            negative_count,
            neutral_count,
        }
    }

    /// Computes the feature triple per unique trade_date in `trade_dates` and
    /// returns a left-joinable map; missing days default to all-zero features.
    pub fn enrich_bars(
        &self,
        symbol: &str,
        trade_dates: &[NaiveDate],
        lookback_days: i64,
        half_life_days: f64,
    ) -> Result<HashMap<NaiveDate, EventFeatureTriple>> {
        let mut out = HashMap::new();
        if trade_dates.is_empty() {
            return Ok(out);
        }
        let earliest = *trade_dates.iter().min().unwrap() - chrono::Duration::days(lookback_days);
        let latest = *trade_dates.iter().max().unwrap();
        let window_start = Utc.from_utc_datetime(&earliest.and_hms_opt(0, 0, 0).unwrap());
        let window_end = Utc.from_utc_datetime(&latest.and_hms_opt(23, 59, 59).unwrap());
        let events = self.store.list_symbol_events_between(symbol, window_start, window_end, 20_000)?;

        for date in trade_dates {
            let day_end = Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).unwrap());
            let features = Self::build_event_features(&events, day_end, lookback_days, half_life_days);
            out.insert(*date, features);
        }
        Ok(out)
    }
}
