//! Point-in-time fundamental enrichment. Grounded on
//! `fundamentals/service.py`'s anchor-then-merge-asof approach.

use crate::domain::{Bar, FundamentalSnapshot};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Default for AnchorFrequency {
    fn default() -> Self {
        AnchorFrequency::Monthly
    }
}

#[async_trait]
pub trait FundamentalProvider: Send + Sync {
    async fn get_fundamental_snapshot(&self, symbol: &str, as_of: NaiveDate) -> Result<FundamentalSnapshot>;
}

#[derive(Debug, Clone)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub roe: Option<f64>,
    pub revenue_yoy: Option<f64>,
    pub net_profit_yoy: Option<f64>,
    pub gross_margin: Option<f64>,
    pub debt_to_asset: Option<f64>,
    pub ocf_to_profit: Option<f64>,
    pub eps: Option<f64>,
    pub fundamental_available: bool,
    pub fundamental_pit_ok: bool,
    pub fundamental_stale_days: i64,
    pub fundamental_is_stale: bool,
    pub fundamental_source: Option<NaiveDate>,
    pub fundamental_report_date: Option<NaiveDate>,
}

pub struct FundamentalService;

impl FundamentalService {
    /// Builds anchor dates from the bar timeline at the given frequency, always
    /// including the first bar date so the earliest rows are not left unenriched.
    fn anchor_dates(bars: &[Bar], frequency: AnchorFrequency) -> Vec<NaiveDate> {
        if bars.is_empty() {
            return Vec::new();
        }
        let mut anchors = vec![bars[0].trade_date];
        let mut last_key: Option<(i32, u32)> = None;
        for bar in bars {
            let include = match frequency {
                AnchorFrequency::Daily => true,
                AnchorFrequency::Weekly => {
                    let key = bar.trade_date.iso_week().year() as i32 * 100 + bar.trade_date.iso_week().week() as i32;
                    let key = (key, 0u32);
                    let changed = last_key != Some(key);
                    last_key = Some(key);
                    changed
                }
                AnchorFrequency::Monthly => {
                    let key = (bar.trade_date.year(), bar.trade_date.month());
                    let changed = last_key != Some(key);
                    last_key = Some(key);
                    changed
                }
                AnchorFrequency::Quarterly => {
                    let quarter = (bar.trade_date.month0() / 3) + 1;
                    let key = (bar.trade_date.year(), quarter);
                    let changed = last_key != Some(key);
                    last_key = Some(key);
                    changed
                }
            };
            if include && bar.trade_date != anchors[0] {
                anchors.push(bar.trade_date);
            }
        }
        anchors.sort();
        anchors.dedup();
        anchors
    }

    pub async fn enrich_bars_pit(
        provider: &dyn FundamentalProvider,
        symbol: &str,
        bars: &[Bar],
        frequency: AnchorFrequency,
        max_staleness_days: i64,
    ) -> Result<Vec<EnrichedBar>> {
        let anchors = Self::anchor_dates(bars, frequency);
        let mut snapshots: Vec<FundamentalSnapshot> = Vec::new();
        for anchor in anchors {
            let snapshot = provider.get_fundamental_snapshot(symbol, anchor).await?;
            if !snapshot.all_metrics_null() {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by_key(|s| s.as_of);

        let mut out = Vec::with_capacity(bars.len());
        for bar in bars {
            let snapshot = snapshots
                .iter()
                .rev()
                .find(|s| s.as_of <= bar.trade_date);
            out.push(Self::merge_one(bar.clone(), snapshot, max_staleness_days));
        }
        Ok(out)
    }

    /// Legacy path: one snapshot applied uniformly to every bar.
    pub fn enrich_bars(bars: &[Bar], snapshot: &FundamentalSnapshot, max_staleness_days: i64) -> Vec<EnrichedBar> {
        bars.iter()
            .map(|bar| Self::merge_one(bar.clone(), Some(snapshot), max_staleness_days))
            .collect()
    }

    fn merge_one(bar: Bar, snapshot: Option<&FundamentalSnapshot>, max_staleness_days: i64) -> EnrichedBar {
        let Some(snapshot) = snapshot else {
            return EnrichedBar {
                bar,
                roe: None,
                revenue_yoy: None,
                net_profit_yoy: None,
                gross_margin: None,
                debt_to_asset: None,
                ocf_to_profit: None,
                eps: None,
                fundamental_available: false,
                fundamental_pit_ok: true,
                fundamental_stale_days: -1,
                fundamental_is_stale: false,
                fundamental_source: None,
                fundamental_report_date: None,
            };
        };

        let available = !snapshot.all_metrics_null();
        let pit_ok = snapshot
            .publish_date
            .map(|p| p <= bar.trade_date)
            .unwrap_or(true);
        let reference_date = snapshot.report_date.or(snapshot.publish_date);
        let stale_days = reference_date
            .map(|d| (bar.trade_date - d).num_days())
            .unwrap_or(-1);
        let is_stale = stale_days > max_staleness_days;

        EnrichedBar {
            bar,
            roe: snapshot.roe,
            revenue_yoy: snapshot.revenue_yoy,
            net_profit_yoy: snapshot.net_profit_yoy,
            gross_margin: snapshot.gross_margin,
            debt_to_asset: snapshot.debt_to_asset,
            ocf_to_profit: snapshot.ocf_to_profit,
            eps: snapshot.eps,
            fundamental_available: available,
            fundamental_pit_ok: pit_ok,
            fundamental_stale_days: stale_days,
            fundamental_is_stale: is_stale,
            fundamental_source: snapshot.publish_date,
            fundamental_report_date: snapshot.report_date,
        }
    }
}
