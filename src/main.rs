//! Entry point: builds `AppState` from environment-sourced `Settings`, spawns the
//! background scheduler worker, and serves the HTTP API.

use anyhow::{Context, Result};
use ashare_governance_core::api;
use ashare_governance_core::config::Settings;
use ashare_governance_core::ops::scheduler::SchedulerWorker;
use ashare_governance_core::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::from_env().context("loading settings")?;
    let http_port = settings.http_port;
    let scheduler_enabled = settings.ops_scheduler_enabled;
    let tick_seconds = settings.ops_scheduler_tick_seconds;
    let sla_grace_minutes = settings.ops_scheduler_sla_grace_minutes;
    let sla_log_cooldown_seconds = settings.ops_scheduler_sla_log_cooldown_seconds;

    let state = AppState::build(settings).context("building application state")?;

    if scheduler_enabled {
        let worker = Arc::new(SchedulerWorker::new(
            state.jobs.clone(),
            state.audit.clone(),
            Some(state.alerts.clone()),
            tick_seconds,
            sla_grace_minutes,
            sla_log_cooldown_seconds,
        ));
        tokio::spawn(worker.run());
        info!(tick_seconds, "scheduler worker started");
    } else {
        info!("scheduler worker disabled");
    }

    let app = api::build_router(state);

    let addr = format!("0.0.0.0:{http_port}");
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ashare_governance_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
