//! The daily pipeline composition. Grounded step-for-step on
//! `pipeline/runner.py`'s `DailyPipelineRunner.run()`: per symbol, fetch bars →
//! license check → quality/PIT → status overlay → event/fundamental enrichment →
//! register snapshot → factors → autotune params → strategy.generate → per-candidate
//! cost/edge/risk/replay → one audit summary event.

use crate::autotune::AutotuneService;
use crate::data::cache::LocalTimeseriesCache;
use crate::data::composite::CompositeProvider;
use crate::domain::{GeneratedSignal, JsonMap, RiskCheckRequest, RiskCheckResult, SignalRecord, TradePrepSheet};
use crate::events::EventService;
use crate::factors::{FactorEngine, FactorRow};
use crate::fundamentals::{AnchorFrequency, EnrichedBar, FundamentalProvider, FundamentalService};
use crate::governance::data_quality::DataQualityService;
use crate::governance::license_service::LicenseService;
use crate::governance::pit::PITValidator;
use crate::governance::snapshot_service::SnapshotService;
use crate::replay::ReplayService;
use crate::risk::engine::RiskEngine;
use crate::store::audit::AuditService;
use crate::strategy::{StrategyContext, StrategyRegistry};
use crate::trading::costs::{estimate_roundtrip_cost_bps, infer_expected_edge_bps, required_cash_for_min_lot};
use crate::trading::small_capital::apply_small_capital_overrides;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PipelineRequest {
    pub symbols: Vec<String>,
    pub strategy_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub strategy_params: JsonMap,
    #[serde(default)]
    pub use_autotune_profile: bool,
    #[serde(default)]
    pub enable_event_enrichment: bool,
    #[serde(default)]
    pub enable_fundamental_enrichment: bool,
    #[serde(default)]
    pub enable_small_capital_mode: bool,
    #[serde(default)]
    pub small_capital_principal: Option<f64>,
    #[serde(default)]
    pub small_capital_min_expected_edge_bps: f64,
    #[serde(default)]
    pub industry_map: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineSymbolResult {
    pub symbol: String,
    pub provider: String,
    pub signal_count: i64,
    pub blocked_count: i64,
    pub warning_count: i64,
    pub quality_passed: bool,
    pub snapshot_id: Option<i64>,
    pub event_rows_used: i64,
    pub fundamental_available: bool,
    pub small_capital_blocked: bool,
    pub small_capital_note: Option<String>,
    pub sheets: Vec<TradePrepSheet>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineRunResult {
    pub run_id: String,
    pub strategy_name: String,
    pub results: Vec<PipelineSymbolResult>,
    pub total_symbols: i64,
    pub total_signals: i64,
    pub total_blocked: i64,
    pub total_warnings: i64,
}

pub struct DailyPipeline {
    provider: CompositeProvider,
    cache: LocalTimeseriesCache,
    registry: StrategyRegistry,
    risk: RiskEngine,
    snapshots: SnapshotService,
    autotune: AutotuneService,
    events: EventService,
    license: LicenseService,
    replay: ReplayService,
    audit: AuditService,
    fundamental_provider: Option<Box<dyn FundamentalProvider>>,
    enforce_data_license: bool,
    default_commission_rate: f64,
    default_slippage_rate: f64,
    fee_min_commission_cny: f64,
    fee_stamp_duty_sell_rate: f64,
    fee_transfer_rate: f64,
    small_capital_mode_enabled: bool,
    small_capital_principal_cny: f64,
    small_capital_cash_buffer_ratio: f64,
    small_capital_lot_size: i64,
    event_lookback_days: i64,
    event_decay_half_life_days: f64,
    fundamental_max_staleness_days: i64,
}

#[allow(clippy::too_many_arguments)]
impl DailyPipeline {
    pub fn new(
        provider: CompositeProvider,
        cache: LocalTimeseriesCache,
        registry: StrategyRegistry,
        risk: RiskEngine,
        snapshots: SnapshotService,
        autotune: AutotuneService,
        events: EventService,
        license: LicenseService,
        replay: ReplayService,
        audit: AuditService,
        fundamental_provider: Option<Box<dyn FundamentalProvider>>,
        enforce_data_license: bool,
        default_commission_rate: f64,
        default_slippage_rate: f64,
        fee_min_commission_cny: f64,
        fee_stamp_duty_sell_rate: f64,
        fee_transfer_rate: f64,
        small_capital_mode_enabled: bool,
        small_capital_principal_cny: f64,
        small_capital_cash_buffer_ratio: f64,
        small_capital_lot_size: i64,
        event_lookback_days: i64,
        event_decay_half_life_days: f64,
        fundamental_max_staleness_days: i64,
    ) -> Self {
        DailyPipeline {
            provider,
            cache,
            registry,
            risk,
            snapshots,
            autotune,
            events,
            license,
            replay,
            audit,
            fundamental_provider,
            enforce_data_license,
            default_commission_rate,
            default_slippage_rate,
            fee_min_commission_cny,
            fee_stamp_duty_sell_rate,
            fee_transfer_rate,
            small_capital_mode_enabled,
            small_capital_principal_cny,
            small_capital_cash_buffer_ratio,
            small_capital_lot_size,
            event_lookback_days,
            event_decay_half_life_days,
            fundamental_max_staleness_days,
        }
    }

    pub async fn run(&self, req: &PipelineRequest) -> Result<PipelineRunResult> {
        let strategy = self.registry.get(&req.strategy_name);
        let use_event_enrichment = req.enable_event_enrichment || req.strategy_name == "event_driven";

        let mut results = Vec::with_capacity(req.symbols.len());
        for symbol in &req.symbols {
            let result = self.run_symbol(req, symbol, strategy.as_deref(), use_event_enrichment).await;
            results.push(result);
        }

        let total_signals = results.iter().map(|r| r.signal_count).sum();
        let total_blocked = results.iter().map(|r| r.blocked_count).sum();
        let total_warnings = results.iter().map(|r| r.warning_count).sum();

        Ok(PipelineRunResult {
            run_id: Uuid::new_v4().to_string(),
            strategy_name: req.strategy_name.clone(),
            total_symbols: results.len() as i64,
            total_signals,
            total_blocked,
            total_warnings,
            results,
        })
    }

    async fn run_symbol(
        &self,
        req: &PipelineRequest,
        symbol: &str,
        strategy: Option<&dyn crate::strategy::StrategyGenerator>,
        use_event_enrichment: bool,
    ) -> PipelineSymbolResult {
        let empty = |provider: &str, quality_passed: bool, snapshot_id: Option<i64>| PipelineSymbolResult {
            symbol: symbol.to_string(),
            provider: provider.to_string(),
            signal_count: 0,
            blocked_count: 0,
            warning_count: 0,
            quality_passed,
            snapshot_id,
            event_rows_used: 0,
            fundamental_available: false,
            small_capital_blocked: false,
            small_capital_note: None,
            sheets: Vec::new(),
        };

        // Step 1: provider bars (through the gap-filling cache).
        let bars = match self.cache.get_or_fetch(&self.provider, symbol, req.start_date, req.end_date).await {
            Ok(bars) => bars,
            Err(_) => return empty("N/A", false, None),
        };
        let used_provider = "composite".to_string();

        // Step 2: license check.
        if let Ok(check) = self.license.check(
            "daily_bars",
            &used_provider,
            "internal_research",
            false,
            Some(bars.len() as i64),
            req.end_date,
        ) {
            if self.enforce_data_license && !check.allowed {
                self.audit.log(
                    "pipeline",
                    "license_denied",
                    "blocked",
                    &json!({"symbol": symbol, "reason": check.reason}),
                );
                return empty(&used_provider, false, None);
            }
        }

        // Step 3: quality + PIT.
        let quality = DataQualityService::evaluate(&bars);
        let pit_hits = PITValidator::validate_bars(&bars, req.end_date);
        let pit_passed = !pit_hits.iter().any(|h| !h.passed && h.level == crate::domain::SignalLevel::Critical);

        // Snapshot registration happens regardless of quality/PIT outcome.
        let content = serde_json::to_value(&bars).unwrap_or(json!([]));
        let snapshot_id = self
            .snapshots
            .register("daily_bars", symbol, req.start_date, req.end_date, &used_provider, "v1", &content)
            .ok();

        if bars.is_empty() || !quality.passed || !pit_passed {
            return empty(&used_provider, quality.passed && pit_passed, snapshot_id);
        }

        // Step 4: status overlay, bar fallback then live status with graceful fallback.
        let mut is_st = bars.last().map(|b| b.is_st).unwrap_or(false);
        let mut is_suspended = bars.last().map(|b| b.is_suspended).unwrap_or(false);
        match self.provider.security_status(symbol, req.end_date).await {
            Ok((_, status)) => {
                is_st = status.is_st;
                is_suspended = status.is_suspended;
            }
            Err(err) => {
                tracing::warn!(symbol, error = %err, "security status lookup failed in pipeline; using bar fallback");
            }
        }
        let bars: Vec<_> = bars
            .into_iter()
            .map(|mut b| {
                b.is_st = is_st;
                b.is_suspended = is_suspended;
                b
            })
            .collect();

        // Step 5: event enrichment (feeds strategy context, not FactorRow).
        let mut event_rows_used = 0i64;
        let mut event_score_by_date: HashMap<NaiveDate, f64> = HashMap::new();
        if use_event_enrichment {
            let trade_dates: Vec<NaiveDate> = bars.iter().map(|b| b.trade_date).collect();
            if let Ok(features) =
                self.events.enrich_bars(symbol, &trade_dates, self.event_lookback_days, self.event_decay_half_life_days)
            {
                event_rows_used = features.values().map(|f| (f.positive_count + f.negative_count + f.neutral_count) as i64).sum();
                for (date, triple) in features {
                    event_score_by_date.insert(date, triple.event_score);
                }
            }
        }

        // Step 6: fundamental enrichment.
        let mut fundamental_available = false;
        let enriched: Option<Vec<EnrichedBar>> = if req.enable_fundamental_enrichment {
            if let Some(provider) = &self.fundamental_provider {
                match FundamentalService::enrich_bars_pit(
                    provider.as_ref(),
                    symbol,
                    &bars,
                    AnchorFrequency::Monthly,
                    self.fundamental_max_staleness_days,
                )
                .await
                {
                    Ok(rows) => {
                        fundamental_available = rows.last().map(|r| r.fundamental_available).unwrap_or(false);
                        Some(rows)
                    }
                    Err(_) => None,
                }
            } else {
                None
            }
        } else {
            None
        };

        // Step 8: factors (step 7, snapshot registration, already ran above).
        let features: Vec<FactorRow> = FactorEngine::compute_one(&bars, enriched.as_deref());
        let Some(latest) = features.last() else {
            return empty(&used_provider, true, snapshot_id);
        };
        let latest_close = bars.last().map(|b| b.close).unwrap_or(0.0);
        let latest_event_score = event_score_by_date.get(&latest.trade_date).copied();

        let Some(strategy) = strategy else {
            return empty(&used_provider, true, snapshot_id);
        };

        // Step 9: autotune.
        let small_capital_mode = self.small_capital_mode_enabled || req.enable_small_capital_mode;
        let small_capital_principal = req.small_capital_principal.unwrap_or(self.small_capital_principal_cny);
        let small_lot = self.small_capital_lot_size.max(1);
        let (strategy_params, _) = self
            .autotune
            .resolve_runtime_params(&req.strategy_name, symbol, &req.strategy_params, req.use_autotune_profile)
            .unwrap_or_else(|_| (req.strategy_params.clone(), None));

        let mut market_state = JsonMap::new();
        market_state.insert("enable_small_capital_mode".to_string(), json!(small_capital_mode));
        market_state.insert("small_capital_principal".to_string(), json!(small_capital_principal));
        market_state.insert("small_capital_lot_size".to_string(), json!(small_lot));
        market_state.insert("small_capital_cash_buffer_ratio".to_string(), json!(self.small_capital_cash_buffer_ratio));
        market_state.insert("commission_rate".to_string(), json!(self.default_commission_rate));
        market_state.insert("min_commission_cny".to_string(), json!(self.fee_min_commission_cny));
        market_state.insert("transfer_fee_rate".to_string(), json!(self.fee_transfer_rate));
        market_state.insert("stamp_duty_sell_rate".to_string(), json!(self.fee_stamp_duty_sell_rate));
        market_state.insert("slippage_rate".to_string(), json!(self.default_slippage_rate));
        if let Some(score) = latest_event_score {
            market_state.insert("event_score".to_string(), json!(score));
        }

        // Step 10: strategy.generate.
        let context = StrategyContext { params: strategy_params.clone(), market_state };
        let mut candidates: Vec<GeneratedSignal> = strategy.generate(&features, &context);

        let max_positions = strategy_params
            .get("max_positions")
            .and_then(|v| v.as_f64())
            .map(|v| v as i64)
            .unwrap_or(3)
            .max(1);

        let required_cash = required_cash_for_min_lot(
            latest_close,
            small_lot,
            self.default_commission_rate,
            self.fee_min_commission_cny,
            self.fee_transfer_rate,
        );
        let roundtrip_cost_bps = estimate_roundtrip_cost_bps(
            latest_close,
            small_lot,
            self.default_commission_rate,
            self.fee_min_commission_cny,
            self.fee_transfer_rate,
            self.fee_stamp_duty_sell_rate,
            self.default_slippage_rate,
        );

        // Step 11: per-candidate overrides, costs, risk, replay, trade prep sheets.
        let mut blocked_count = 0i64;
        let mut warning_count = 0i64;
        let mut small_capital_note = None;
        let mut small_capital_blocked = false;
        let mut sheets = Vec::with_capacity(candidates.len());

        for signal in candidates.iter_mut() {
            let _ = apply_small_capital_overrides(
                signal,
                small_capital_mode,
                small_capital_principal,
                latest_close,
                small_lot,
                self.default_commission_rate,
                self.fee_min_commission_cny,
                self.fee_transfer_rate,
                self.small_capital_cash_buffer_ratio,
                0.50,
                max_positions,
            );

            let expected_edge_bps = infer_expected_edge_bps(
                signal.confidence,
                latest.momentum20,
                latest_event_score,
                if latest.fundamental_available { latest.fundamental_score } else { None },
            );

            let risk_req = RiskCheckRequest {
                signal: Some(signal.to_risk_candidate()),
                position: None,
                is_st,
                is_suspended,
                at_limit_up: false,
                at_limit_down: false,
                avg_turnover_20d: latest.turnover20,
                portfolio: None,
                symbol_industry: req.industry_map.get(symbol).cloned(),
                fundamental_pit_ok: enriched.as_ref().and_then(|e| e.last()).map(|e| e.fundamental_pit_ok),
                fundamental_score: if latest.fundamental_available { latest.fundamental_score } else { None },
                fundamental_stale_days: enriched.as_ref().and_then(|e| e.last()).map(|e| e.fundamental_stale_days),
                enable_small_capital_mode: small_capital_mode,
                available_cash: Some(small_capital_principal),
                small_capital_principal: Some(small_capital_principal),
                required_cash_for_min_lot: Some(required_cash),
                small_capital_cash_buffer_ratio: self.small_capital_cash_buffer_ratio,
                expected_edge_bps: Some(expected_edge_bps),
                estimated_roundtrip_cost_bps: Some(roundtrip_cost_bps),
                min_expected_edge_bps: Some(req.small_capital_min_expected_edge_bps),
                tushare_disclosure_risk_score: latest.tushare_disclosure_risk_score,
                tushare_forecast_pct: None,
                tushare_pledge_ratio: None,
                tushare_unlock_ratio: None,
                tushare_overhang_score: latest.tushare_overhang_risk_score,
            };
            let risk_result: RiskCheckResult = self.risk.evaluate_signal(&risk_req);

            let small_hits_all: Vec<&crate::domain::RuleHit> =
                risk_result.hits.iter().filter(|h| h.rule_name == "small_capital_tradability").collect();
            let small_hits_failed: Vec<&crate::domain::RuleHit> =
                small_hits_all.iter().copied().filter(|h| !h.passed).collect();
            if !small_hits_all.is_empty() && small_capital_note.is_none() {
                small_capital_note = Some(
                    small_hits_failed.first().or(small_hits_all.first()).map(|h| h.message.clone()).unwrap_or_default(),
                );
            }
            if small_hits_failed.iter().any(|h| h.level == crate::domain::SignalLevel::Critical) {
                small_capital_blocked = true;
            }
            if risk_result.blocked {
                blocked_count += 1;
            } else if risk_result.level == crate::domain::SignalLevel::Warning {
                warning_count += 1;
            }

            let signal_id = Uuid::new_v4().to_string();
            let record = SignalRecord {
                signal_id: signal_id.clone(),
                symbol: symbol.to_string(),
                strategy_name: req.strategy_name.clone(),
                trade_date: signal.trade_date,
                action: signal.action,
                confidence: signal.confidence,
                reason: signal.reason.clone(),
                suggested_position: signal.suggested_position,
            };
            let _ = self.replay.record_signal(&record);

            sheets.push(TradePrepSheet {
                signal_id,
                symbol: symbol.to_string(),
                strategy_name: req.strategy_name.clone(),
                trade_date: signal.trade_date,
                action: signal.action,
                confidence: signal.confidence,
                reason: signal.reason.clone(),
                suggested_position: signal.suggested_position,
                expected_edge_bps,
                estimated_roundtrip_cost_bps: roundtrip_cost_bps,
                required_cash_for_min_lot: required_cash,
                blocked: risk_result.blocked,
                risk_level: risk_result.level,
                risk_summary: risk_result.summary.clone(),
                risk_recommendations: risk_result.recommendations.clone(),
                metadata: signal.metadata.clone(),
            });
        }

        // Step 12: one audit event per symbol.
        self.audit.log(
            "pipeline",
            "symbol_run",
            "ok",
            &json!({
                "symbol": symbol,
                "provider": used_provider,
                "signal_count": candidates.len(),
                "blocked_count": blocked_count,
                "warning_count": warning_count,
                "is_st": is_st,
                "is_suspended": is_suspended,
                "quality_passed": quality.passed,
                "run_at": Utc::now().to_rfc3339(),
            }),
        );

        PipelineSymbolResult {
            symbol: symbol.to_string(),
            provider: used_provider,
            signal_count: candidates.len() as i64,
            blocked_count,
            warning_count,
            quality_passed: true,
            snapshot_id,
            event_rows_used,
            fundamental_available,
            small_capital_blocked,
            small_capital_note,
            sheets,
        }
    }
}

/// Bridges the synchronous `JobHandler` contract the scheduler calls into onto the
/// async pipeline. `block_in_place` is the tokio-sanctioned way to block on an async
/// call from inside code already driving another task on a multi-threaded runtime;
/// a bare `Handle::block_on` here would panic with "Cannot start a runtime from
/// within a runtime" since `SchedulerWorker::run` calls `scheduler_tick` from within
/// its own async task.
pub struct DailyPipelineJob {
    pipeline: std::sync::Arc<DailyPipeline>,
    request: PipelineRequest,
}

impl DailyPipelineJob {
    pub fn new(pipeline: std::sync::Arc<DailyPipeline>, request: PipelineRequest) -> Self {
        DailyPipelineJob { pipeline, request }
    }
}

impl crate::ops::job_service::JobHandler for DailyPipelineJob {
    fn run(&self, job_name: &str) -> Result<String> {
        let result = tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(self.pipeline.run(&self.request)))?;
        Ok(format!(
            "job={job_name} run_id={} symbols={} signals={} blocked={}",
            result.run_id, result.total_symbols, result.total_signals, result.total_blocked
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_request_is_constructible() {
        let req = PipelineRequest {
            symbols: vec!["600000.SH".to_string()],
            strategy_name: "demo".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            strategy_params: JsonMap::new(),
            use_autotune_profile: false,
            enable_event_enrichment: false,
            enable_fundamental_enrichment: false,
            enable_small_capital_mode: false,
            small_capital_principal: None,
            small_capital_min_expected_edge_bps: 45.0,
            industry_map: HashMap::new(),
        };
        assert_eq!(req.symbols.len(), 1);
    }
}
