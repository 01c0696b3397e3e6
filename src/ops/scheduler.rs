//! `SchedulerWorker`. Grounded on `ops/scheduler_worker.py`: a tokio
//! task that ticks the `JobService` on an interval, logs new SLA breaches to the
//! audit trail with a cooldown, and optionally republishes alerts from the log.

use crate::alerts::service::AlertService;
use crate::ops::job_service::{JobService, SlaBreach};
use crate::store::audit::AuditService;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{error, info};

pub struct SchedulerWorker {
    jobs: Arc<JobService>,
    audit: Arc<AuditService>,
    alerts: Option<Arc<AlertService>>,
    tick_interval: StdDuration,
    sla_grace_minutes: i64,
    sla_log_cooldown_seconds: i64,
    last_logged: Mutex<HashMap<String, i64>>,
}

impl SchedulerWorker {
    pub fn new(
        jobs: Arc<JobService>,
        audit: Arc<AuditService>,
        alerts: Option<Arc<AlertService>>,
        tick_seconds: u64,
        sla_grace_minutes: i64,
        sla_log_cooldown_seconds: i64,
    ) -> Self {
        SchedulerWorker {
            jobs,
            audit,
            alerts,
            tick_interval: StdDuration::from_secs(tick_seconds.max(1)),
            sla_grace_minutes,
            sla_log_cooldown_seconds,
            last_logged: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match self.jobs.scheduler_tick(now, "scheduler_worker") {
                Ok(result) => {
                    if !result.errors.is_empty() {
                        error!(?result.errors, "scheduler tick reported errors");
                    }
                }
                Err(err) => error!(error = %err, "scheduler tick failed"),
            }

            match self.jobs.evaluate_sla(now, self.sla_grace_minutes, Some(60)) {
                Ok(breaches) => self.log_new_breaches(&breaches, now.timestamp()),
                Err(err) => error!(error = %err, "sla evaluation failed"),
            }

            if let Some(alerts) = &self.alerts {
                if let Err(err) = alerts.sync_from_audit(200).await {
                    error!(error = %err, "alert sync from audit failed");
                }
            }
        }
    }

    fn log_new_breaches(&self, breaches: &[SlaBreach], now_epoch: i64) {
        let mut last_logged = self.last_logged.lock();
        for breach in breaches {
            let key = format!(
                "{}|{}|{}",
                breach.job_name,
                breach.breach_type,
                breach.expected_iso.clone().unwrap_or_default()
            );
            let recently_logged = last_logged
                .get(&key)
                .map(|t| now_epoch - t < self.sla_log_cooldown_seconds)
                .unwrap_or(false);
            if recently_logged {
                continue;
            }
            last_logged.insert(key, now_epoch);
            self.audit.log(
                "ops_sla",
                &breach.breach_type,
                "BREACH",
                &json!({
                    "job_name": breach.job_name,
                    "severity": breach.severity,
                    "expected": breach.expected_iso,
                    "message": breach.message,
                }),
            );
            info!(job = breach.job_name, breach_type = breach.breach_type, "sla breach logged");
        }
    }
}
