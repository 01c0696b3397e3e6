//! `AppState`: the dependency container shared across axum handlers. Grounded on
//! `main.rs`'s own `AppState` struct, stripped of the market-data-specific fields
//! (signal storage, risk manager, websocket broadcast) and rebuilt around the
//! governance stores this system actually owns.

use crate::alerts::dispatcher::{AlertDispatcher, NoopDispatcher, RealAlertDispatcher};
use crate::alerts::service::AlertService;
use crate::autotune::AutotuneService;
use crate::config::Settings;
use crate::data::cache::LocalTimeseriesCache;
use crate::data::composite::CompositeProvider;
use crate::data::provider::StaticProvider;
use crate::domain::SecurityStatus;
use crate::events::EventService;
use crate::governance::license_service::LicenseService;
use crate::governance::snapshot_service::SnapshotService;
use crate::holdings::HoldingsService;
use crate::ops::job_service::JobService;
use crate::pipelines::{DailyPipeline, DailyPipelineJob, PipelineRequest};
use crate::replay::ReplayService;
use crate::risk::engine::RiskEngine;
use crate::store::audit::{AuditService, AuditStore};
use crate::store::autotune::AutotuneStore;
use crate::store::event::EventStore;
use crate::store::holdings::HoldingsStore;
use crate::store::job::JobStore;
use crate::store::license::LicenseStore;
use crate::store::market_cache::MarketCacheStore;
use crate::store::replay::ReplayStore;
use crate::store::snapshot::SnapshotStore;
use crate::store::strategy_gov::StrategyGovStore;
use crate::strategy::StrategyRegistry;
use crate::strategy_governance::StrategyGovernance;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub audit: Arc<AuditService>,
    pub cache: Arc<LocalTimeseriesCache>,
    pub license: Arc<LicenseService>,
    pub snapshots: Arc<SnapshotService>,
    pub events: Arc<EventService>,
    pub risk: Arc<RiskEngine>,
    pub governance: Arc<StrategyGovernance>,
    pub autotune: Arc<AutotuneService>,
    pub replay: Arc<ReplayService>,
    pub holdings: Arc<HoldingsService>,
    pub jobs: Arc<JobService>,
    pub alerts: Arc<AlertService>,
    pub strategies: Arc<StrategyRegistry>,
    pub pipeline: Arc<DailyPipeline>,
}

impl AppState {
    pub fn build(settings: Settings) -> Result<Self> {
        let settings = Arc::new(settings);

        let audit = Arc::new(AuditService::new(AuditStore::new(&settings.audit_db_path)?));
        let cache_store = MarketCacheStore::new(&settings.market_cache_db_path)?;
        let cache = Arc::new(LocalTimeseriesCache::new(cache_store));
        let license = Arc::new(LicenseService::new(LicenseStore::new(&settings.license_db_path)?));
        let snapshots = Arc::new(SnapshotService::new(SnapshotStore::new(&settings.snapshot_db_path)?));
        let events = Arc::new(EventService::new(EventStore::new(&settings.event_db_path)?));
        let risk = Arc::new(RiskEngine::from_settings(&settings));
        let governance = Arc::new(StrategyGovernance::new(StrategyGovStore::new(&settings.strategy_gov_db_path)?));
        let autotune = Arc::new(AutotuneService::new(AutotuneStore::new(&settings.autotune_db_path)?));
        let replay = Arc::new(ReplayService::new(ReplayStore::new(&settings.replay_db_path)?));
        let holdings = Arc::new(HoldingsService::new(HoldingsStore::new(&settings.holdings_db_path)?));

        let job_store = JobStore::new(&settings.job_db_path)?;
        let mut jobs = JobService::new(job_store, settings.ops_scheduler_timezone.clone());

        let alert_store = crate::store::alert::AlertStore::new(&settings.alert_db_path)?;
        let alert_audit = AuditService::new(AuditStore::new(&settings.audit_db_path)?);
        let dispatcher: Box<dyn AlertDispatcher> = if settings.alert_email_enabled || settings.alert_im_enabled {
            Box::new(RealAlertDispatcher::new((*settings).clone()))
        } else {
            Box::new(NoopDispatcher)
        };
        let alerts = Arc::new(AlertService::new(alert_store, alert_audit, dispatcher, settings.alert_default_runbook_base_url.clone()));

        let strategies = Arc::new(StrategyRegistry::new());

        // No real market-data adapter is wired in by default: providers are an
        // external collaborator out of scope here. The static fallback keeps
        // the pipeline constructible and usable in tests without one.
        let provider = CompositeProvider::new(vec![Box::new(StaticProvider::new(
            "static",
            Vec::new(),
            Vec::new(),
            SecurityStatus { is_st: false, is_suspended: false },
        ))]);
        let pipeline_cache = LocalTimeseriesCache::new(MarketCacheStore::new(&settings.market_cache_db_path)?);
        let pipeline = Arc::new(DailyPipeline::new(
            provider,
            pipeline_cache,
            StrategyRegistry::new(),
            RiskEngine::from_settings(&settings),
            SnapshotService::new(SnapshotStore::new(&settings.snapshot_db_path)?),
            AutotuneService::new(AutotuneStore::new(&settings.autotune_db_path)?),
            EventService::new(EventStore::new(&settings.event_db_path)?),
            LicenseService::new(LicenseStore::new(&settings.license_db_path)?),
            ReplayService::new(ReplayStore::new(&settings.replay_db_path)?),
            AuditService::new(AuditStore::new(&settings.audit_db_path)?),
            None,
            settings.enforce_data_license,
            settings.default_commission_rate,
            settings.default_slippage_rate,
            settings.fee_min_commission_cny,
            settings.fee_stamp_duty_sell_rate,
            settings.fee_transfer_rate,
            settings.small_capital_mode_enabled,
            settings.small_capital_principal_cny,
            settings.small_capital_cash_buffer_ratio,
            settings.small_capital_lot_size,
            settings.event_lookback_days,
            settings.event_decay_half_life_days,
            settings.fundamental_max_staleness_days,
        ));

        let today = Utc::now().date_naive();
        let default_request = PipelineRequest {
            symbols: Vec::new(),
            strategy_name: "default".to_string(),
            start_date: today - Duration::days(30),
            end_date: today,
            strategy_params: HashMap::new(),
            use_autotune_profile: true,
            enable_event_enrichment: false,
            enable_fundamental_enrichment: settings.enable_fundamental_enrichment,
            enable_small_capital_mode: settings.small_capital_mode_enabled,
            small_capital_principal: None,
            small_capital_min_expected_edge_bps: settings.small_capital_min_edge_bps,
            industry_map: HashMap::new(),
        };
        jobs.register_handler("daily_pipeline", Arc::new(DailyPipelineJob::new(pipeline.clone(), default_request)));
        let jobs = Arc::new(jobs);

        Ok(AppState {
            settings,
            audit,
            cache,
            license,
            snapshots,
            events,
            risk,
            governance,
            autotune,
            replay,
            holdings,
            jobs,
            alerts,
            strategies,
            pipeline,
        })
    }
}
