//! `JobService::scheduler_tick` / `evaluate_sla`. No surviving `ops/job_service.py`
//! was present in the retrieved source tree (only `ops/cron.py` and
//! `ops/job_store.py`); this is built from the documented scheduler semantics and
//! the `JobStore`/`CronSchedule` APIs it names.

use super::cron::CronSchedule;
use crate::domain::{JobRunStatus, JobStatus, SignalLevel};
use crate::store::job::JobStore;
use crate::util::now_iso;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub trait JobHandler: Send + Sync {
    fn run(&self, job_name: &str) -> Result<String>;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TickResult {
    pub tick_time: String,
    pub timezone: String,
    pub matched_jobs: Vec<String>,
    pub triggered_runs: Vec<String>,
    pub skipped_jobs: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SlaBreach {
    pub job_name: String,
    pub breach_type: String,
    pub severity: SignalLevel,
    pub expected_iso: Option<String>,
    pub message: String,
}

pub struct JobService {
    store: JobStore,
    timezone: String,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobService {
    pub fn new(store: JobStore, timezone: String) -> Self {
        JobService {
            store,
            timezone,
            handlers: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, handler_name: &str, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler_name.to_string(), handler);
    }

    pub fn register_job(&self, job_name: &str, cron_expr: &str, sla_minutes: i64, handler: &str) -> Result<i64> {
        self.store.upsert_job(job_name, cron_expr, sla_minutes, handler)
    }

    pub fn list_jobs(&self) -> Result<Vec<crate::store::job::Job>> {
        self.store.list_active_jobs()
    }

    /// Runs a single registered job's handler immediately, outside the scheduler's
    /// cron matching, and records the run the same way `scheduler_tick` does.
    pub fn run_job_now(&self, job_name: &str) -> Result<String> {
        let job = self
            .store
            .get_job(job_name)?
            .ok_or_else(|| anyhow::anyhow!("job '{job_name}' not found"))?;
        let handler = self
            .handlers
            .get(&job.handler)
            .ok_or_else(|| anyhow::anyhow!("no handler registered for '{}'", job.handler))?;

        let run_id = self.store.start_run(job_name)?;
        match handler.run(job_name) {
            Ok(summary) => {
                self.store.finish_run(run_id, JobRunStatus::Success, Some(&summary))?;
                Ok(summary)
            }
            Err(err) => {
                self.store.finish_run(run_id, JobRunStatus::Failed, Some(&err.to_string()))?;
                Err(err)
            }
        }
    }

    /// Normalizes `as_of` to whole minutes (the scheduler timezone is tracked for
    /// reporting only — all comparisons stay in UTC since `DateTime<Utc>` is the
    /// process-wide clock type).
    pub fn scheduler_tick(&self, as_of: DateTime<Utc>, _triggered_by: &str) -> Result<TickResult> {
        let tick_time = truncate_to_minute(as_of);
        let mut matched_jobs = Vec::new();
        let mut triggered_runs = Vec::new();
        let mut skipped_jobs = Vec::new();
        let mut errors = Vec::new();

        for job in self.store.list_active_jobs()? {
            if job.cron_expr.trim().is_empty() {
                continue;
            }
            let cron = match CronSchedule::parse(&job.cron_expr) {
                Ok(c) => c,
                Err(err) => {
                    errors.push(format!("{}: invalid cron '{}': {err}", job.job_name, job.cron_expr));
                    continue;
                }
            };
            if !cron.matches(tick_time) {
                continue;
            }
            matched_jobs.push(job.job_name.clone());

            if let Some(latest) = self.store.latest_run(&job.job_name)? {
                if let Ok(started) = latest.started_at.parse::<DateTime<Utc>>() {
                    if truncate_to_minute(started) == tick_time {
                        skipped_jobs.push(job.job_name.clone());
                        continue;
                    }
                }
            }

            let run_id = self.store.start_run(&job.job_name)?;
            let run_token = Uuid::new_v4().simple().to_string();
            let handler = self.handlers.get(&job.handler);
            match handler {
                Some(handler) => match handler.run(&job.job_name) {
                    Ok(summary) => {
                        self.store.finish_run(run_id, JobRunStatus::Success, Some(&summary))?;
                        triggered_runs.push(run_token);
                    }
                    Err(err) => {
                        self.store.finish_run(run_id, JobRunStatus::Failed, Some(&err.to_string()))?;
                        errors.push(format!("{}: {err}", job.job_name));
                    }
                },
                None => {
                    let message = format!("no handler registered for '{}'", job.handler);
                    self.store.finish_run(run_id, JobRunStatus::Failed, Some(&message))?;
                    errors.push(format!("{}: {message}", job.job_name));
                }
            }
        }

        Ok(TickResult {
            tick_time: tick_time.to_rfc3339(),
            timezone: self.timezone.clone(),
            matched_jobs,
            triggered_runs,
            skipped_jobs,
            errors,
        })
    }

    pub fn evaluate_sla(
        &self,
        as_of: DateTime<Utc>,
        grace_minutes: i64,
        running_timeout_minutes: Option<i64>,
    ) -> Result<Vec<SlaBreach>> {
        let mut breaches = Vec::new();
        let grace_boundary = as_of - Duration::minutes(grace_minutes);

        for job in self.store.list_active_jobs()? {
            if job.cron_expr.trim().is_empty() || job.status != JobStatus::Active {
                continue;
            }
            let cron = match CronSchedule::parse(&job.cron_expr) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if let Some(expected) = cron.previous_at_or_before(grace_boundary) {
                let runs = self.store.list_runs(&job.job_name, 50)?;
                let has_success_since = runs.iter().any(|r| {
                    r.status == JobRunStatus::Success
                        && r.started_at
                            .parse::<DateTime<Utc>>()
                            .map(|t| t >= expected)
                            .unwrap_or(false)
                });
                if !has_success_since {
                    let overdue_minutes = (as_of - expected).num_minutes();
                    let severity = if overdue_minutes > grace_minutes * 3 {
                        SignalLevel::Critical
                    } else {
                        SignalLevel::Warning
                    };
                    breaches.push(SlaBreach {
                        job_name: job.job_name.clone(),
                        breach_type: "MISSED_RUN".to_string(),
                        severity,
                        expected_iso: Some(expected.to_rfc3339()),
                        message: format!("no successful run of '{}' since expected {}", job.job_name, expected.to_rfc3339()),
                    });
                }

                if let Some(timeout) = running_timeout_minutes {
                    for run in &runs {
                        if run.status == JobRunStatus::Running {
                            if let Ok(started) = run.started_at.parse::<DateTime<Utc>>() {
                                if (as_of - started).num_minutes() > timeout {
                                    breaches.push(SlaBreach {
                                        job_name: job.job_name.clone(),
                                        breach_type: "RUN_TIMEOUT".to_string(),
                                        severity: SignalLevel::Critical,
                                        expected_iso: None,
                                        message: format!("run {} of '{}' has been RUNNING past the {timeout}m timeout", run.id, job.job_name),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(breaches)
    }

    pub fn now_iso_for_log(&self) -> String {
        now_iso()
    }
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::seconds(t.timestamp() % 60) - Duration::nanoseconds(t.timestamp_subsec_nanos() as i64)
}
