//! Scheduled job registry + run history. Grounded on
//! `ops/job_store.py`; `JobService::scheduler_tick` (src/ops/job_service.rs) is the
//! consumer that decides idempotency and SLA breaches on top of this store.

use crate::domain::{JobRunStatus, JobStatus};
use crate::util::now_iso;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub job_name: String,
    pub cron_expr: String,
    pub sla_minutes: i64,
    pub status: JobStatus,
    pub handler: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: JobRunStatus,
    pub error_message: Option<String>,
}

pub struct JobStore {
    db_path: String,
}

impl JobStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = JobStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening job db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name TEXT NOT NULL UNIQUE,
                cron_expr TEXT NOT NULL,
                sla_minutes INTEGER NOT NULL,
                status TEXT NOT NULL,
                handler TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS job_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_name TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                status TEXT NOT NULL,
                error_message TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_job_run_job_started ON job_runs(job_name, started_at DESC)",
            [],
        )?;
        Ok(())
    }

    pub fn upsert_job(&self, job_name: &str, cron_expr: &str, sla_minutes: i64, handler: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO jobs(job_name, cron_expr, sla_minutes, status, handler)
             VALUES (?1, ?2, ?3, 'ACTIVE', ?4)
             ON CONFLICT(job_name) DO UPDATE SET cron_expr=excluded.cron_expr,
                sla_minutes=excluded.sla_minutes, handler=excluded.handler",
            params![job_name, cron_expr, sla_minutes, handler],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM jobs WHERE job_name = ?1",
            params![job_name],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn set_status(&self, job_name: &str, status: JobStatus) -> Result<()> {
        let status_str = match status {
            JobStatus::Active => "ACTIVE",
            JobStatus::Disabled => "DISABLED",
        };
        let conn = self.conn()?;
        conn.execute(
            "UPDATE jobs SET status = ?1 WHERE job_name = ?2",
            params![status_str, job_name],
        )?;
        Ok(())
    }

    pub fn get_job(&self, job_name: &str) -> Result<Option<Job>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, job_name, cron_expr, sla_minutes, status, handler FROM jobs WHERE job_name = ?1",
            params![job_name],
            Self::row_to_job,
        )
        .optional()
        .context("fetching job")
    }

    pub fn list_active_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, job_name, cron_expr, sla_minutes, status, handler FROM jobs WHERE status = 'ACTIVE'",
        )?;
        let rows = stmt.query_map([], Self::row_to_job)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn start_run(&self, job_name: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO job_runs(job_name, started_at, status) VALUES (?1, ?2, 'RUNNING')",
            params![job_name, now_iso()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn finish_run(&self, run_id: i64, status: JobRunStatus, error_message: Option<&str>) -> Result<()> {
        let status_str = match status {
            JobRunStatus::Running => "RUNNING",
            JobRunStatus::Success => "SUCCESS",
            JobRunStatus::Failed => "FAILED",
        };
        let conn = self.conn()?;
        conn.execute(
            "UPDATE job_runs SET finished_at = ?1, status = ?2, error_message = ?3 WHERE id = ?4",
            params![now_iso(), status_str, error_message, run_id],
        )?;
        Ok(())
    }

    pub fn latest_run(&self, job_name: &str) -> Result<Option<JobRun>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, job_name, started_at, finished_at, status, error_message
             FROM job_runs WHERE job_name = ?1 ORDER BY id DESC LIMIT 1",
            params![job_name],
            Self::row_to_run,
        )
        .optional()
        .context("fetching latest run")
    }

    pub fn list_runs(&self, job_name: &str, limit: i64) -> Result<Vec<JobRun>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, job_name, started_at, finished_at, status, error_message
             FROM job_runs WHERE job_name = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![job_name, limit.clamp(1, 5000)], Self::row_to_run)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn row_to_job(r: &rusqlite::Row) -> rusqlite::Result<Job> {
        let status: String = r.get(4)?;
        Ok(Job {
            id: r.get(0)?,
            job_name: r.get(1)?,
            cron_expr: r.get(2)?,
            sla_minutes: r.get(3)?,
            status: if status == "ACTIVE" {
                JobStatus::Active
            } else {
                JobStatus::Disabled
            },
            handler: r.get(5)?,
        })
    }

    fn row_to_run(r: &rusqlite::Row) -> rusqlite::Result<JobRun> {
        let status: String = r.get(4)?;
        Ok(JobRun {
            id: r.get(0)?,
            job_name: r.get(1)?,
            started_at: r.get(2)?,
            finished_at: r.get(3)?,
            status: match status.as_str() {
                "SUCCESS" => JobRunStatus::Success,
                "FAILED" => JobRunStatus::Failed,
                _ => JobRunStatus::Running,
            },
            error_message: r.get(5)?,
        })
    }
}
