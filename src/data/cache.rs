//! Gap-filling timeseries cache. Compares cached trade dates
//! against the trade calendar for the window; only the missing dates are fetched
//! from upstream, merged in, and re-persisted. Grounded on `data/cache_store.py`'s
//! merge-on-read behavior.

use crate::data::composite::CompositeProvider;
use crate::domain::Bar;
use crate::store::market_cache::MarketCacheStore;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashSet;

pub struct LocalTimeseriesCache {
    store: MarketCacheStore,
}

impl LocalTimeseriesCache {
    pub fn new(store: MarketCacheStore) -> Self {
        LocalTimeseriesCache { store }
    }

    /// Returns the full bar series for `symbol` across [start, end], fetching only
    /// the gaps (trading days present on the calendar but absent from the cache)
    /// from `provider` and persisting them before returning the merged series.
    pub async fn get_or_fetch(
        &self,
        provider: &CompositeProvider,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        let (_, calendar_days) = provider.trade_calendar(start, end).await?;
        let trading_dates: Vec<NaiveDate> = calendar_days
            .iter()
            .filter(|d| d.is_open)
            .map(|d| d.trade_date)
            .collect();

        let cached_dates: HashSet<NaiveDate> = self
            .store
            .trade_date_range("composite", symbol, start, end)?
            .into_iter()
            .collect();

        let gaps: Vec<NaiveDate> = trading_dates
            .iter()
            .filter(|d| !cached_dates.contains(d))
            .copied()
            .collect();

        if !gaps.is_empty() {
            let gap_start = *gaps.first().unwrap();
            let gap_end = *gaps.last().unwrap();
            let (_, fetched) = provider.fetch_bars(symbol, gap_start, gap_end).await?;
            let gap_set: HashSet<NaiveDate> = gaps.iter().copied().collect();
            let to_store: Vec<Bar> = fetched
                .into_iter()
                .filter(|b| gap_set.contains(&b.trade_date))
                .collect();
            if !to_store.is_empty() {
                self.store.upsert_bars("composite", &to_store)?;
            }
        }

        self.store.bars_between("composite", symbol, start, end)
    }

    pub fn bars_between(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        self.store.bars_between("composite", symbol, start, end)
    }
}
