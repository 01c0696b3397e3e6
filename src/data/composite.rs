//! Ordered failover across configured providers. Tries each provider
//! in `Settings.data_provider_priority` order, falling through on error, and reports
//! which provider actually answered so callers can stamp provenance on a Snapshot.

use super::provider::MarketDataProvider;
use crate::domain::{Bar, SecurityStatus, TradeCalendarDay};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use tracing::warn;

pub struct CompositeProvider {
    providers: Vec<Box<dyn MarketDataProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Box<dyn MarketDataProvider>>) -> Self {
        CompositeProvider { providers }
    }

    pub async fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(String, Vec<Bar>)> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.fetch_bars(symbol, start, end).await {
                Ok(bars) => return Ok((provider.name().to_string(), bars)),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "provider failed, trying next");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no providers configured")))
    }

    pub async fn trade_calendar(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(String, Vec<TradeCalendarDay>)> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.trade_calendar(start, end).await {
                Ok(days) => return Ok((provider.name().to_string(), days)),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "provider failed, trying next");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no providers configured")))
    }

    pub async fn security_status(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<(String, SecurityStatus)> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.security_status(symbol, as_of).await {
                Ok(status) => return Ok((provider.name().to_string(), status)),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "provider failed, trying next");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no providers configured")))
    }
}
