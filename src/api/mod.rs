//! HTTP surface: one axum router built from `AppState`. `/health` is the only
//! unauthenticated route; everything else sits behind `auth::middleware::auth_middleware`.
//! Mirrors a public/protected router split with tracing/CORS layering.

pub mod alerts;
pub mod audit;
pub mod autotune;
pub mod events;
pub mod governance;
pub mod health;
pub mod holdings;
pub mod license;
pub mod ops;
pub mod pipeline;
pub mod replay;
pub mod risk;
pub mod snapshot;

use crate::auth::middleware::auth_middleware;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/pipeline/generate", post(pipeline::generate))
        .route("/risk/signal", post(risk::evaluate_signal))
        .route("/risk/portfolio", post(risk::evaluate_portfolio))
        .route("/governance/strategies", post(governance::register_draft))
        .route("/governance/strategies/:strategy_name", get(governance::get_strategy))
        .route("/governance/strategies/:strategy_name/submit", post(governance::submit_review))
        .route("/governance/strategies/:strategy_name/decide", post(governance::decide))
        .route("/governance/strategies/:strategy_name/retire", post(governance::retire))
        .route("/governance/strategies/:strategy_name/history", get(governance::history))
        .route("/ops/jobs", post(ops::register_job).get(ops::list_jobs))
        .route("/ops/jobs/:job_name/run", post(ops::run_job))
        .route("/ops/scheduler/tick", post(ops::scheduler_tick))
        .route("/ops/scheduler/sla", get(ops::scheduler_sla))
        .route("/alerts/subscriptions", post(alerts::create_subscription))
        .route("/alerts/notifications", get(alerts::list_notifications))
        .route("/alerts/notifications/:notification_id/ack", post(alerts::ack_notification))
        .route("/alerts/sync", post(alerts::sync))
        .route("/audit/events", get(audit::list_events))
        .route("/audit/verify", get(audit::verify_chain))
        .route("/audit/export/csv", get(audit::export_csv))
        .route("/audit/export/jsonl", get(audit::export_jsonl))
        .route("/holdings/lots", post(holdings::record_lot))
        .route("/holdings/positions", get(holdings::all_positions))
        .route("/holdings/positions/:symbol", get(holdings::position))
        .route("/holdings/lots/:symbol", get(holdings::lots))
        .route("/replay/signals", post(replay::record_signal).get(replay::list_signals))
        .route("/replay/executions", post(replay::record_execution))
        .route("/replay/report", get(replay::report))
        .route("/autotune/activate", post(autotune::activate))
        .route("/autotune/rollback", post(autotune::rollback))
        .route("/events/sources", post(events::register_source))
        .route("/events/ingest", post(events::ingest_batch))
        .route("/events/validate-join", post(events::validate_join))
        .route("/license/register", post(license::register))
        .route("/license/check", post(license::check))
        .route("/snapshots", post(snapshot::register))
        .route("/snapshots/:id", get(snapshot::get))
        .route_layer(middleware::from_fn_with_state(state.settings.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
