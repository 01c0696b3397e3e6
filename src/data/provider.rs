//! Market data provider capability interface: a trait any data source can
//! implement, rather than an inheritance-based adapter hierarchy.

use crate::domain::{Bar, SecurityStatus, TradeCalendarDay};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>>;

    async fn trade_calendar(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TradeCalendarDay>>;

    async fn security_status(&self, symbol: &str, as_of: NaiveDate) -> Result<SecurityStatus>;
}

/// In-memory provider used by tests and as a safe fallback when no upstream provider
/// is configured: a deterministic stub kept alongside real exchange adapters.
pub struct StaticProvider {
    provider_name: String,
    bars: Vec<Bar>,
    calendar: Vec<TradeCalendarDay>,
    status: SecurityStatus,
}

impl StaticProvider {
    pub fn new(
        provider_name: impl Into<String>,
        bars: Vec<Bar>,
        calendar: Vec<TradeCalendarDay>,
        status: SecurityStatus,
    ) -> Self {
        StaticProvider {
            provider_name: provider_name.into(),
            bars,
            calendar,
            status,
        }
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn fetch_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        Ok(self
            .bars
            .iter()
            .filter(|b| b.symbol == symbol && b.trade_date >= start && b.trade_date <= end)
            .cloned()
            .collect())
    }

    async fn trade_calendar(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TradeCalendarDay>> {
        Ok(self
            .calendar
            .iter()
            .filter(|d| d.trade_date >= start && d.trade_date <= end)
            .cloned()
            .collect())
    }

    async fn security_status(&self, _symbol: &str, _as_of: NaiveDate) -> Result<SecurityStatus> {
        Ok(self.status.clone())
    }
}
