//! Strategy governance state machine store.
//! Grounded on `strategy/governance_store.py`.

use crate::domain::{GovernanceDecision, StrategyStatus};
use crate::util::now_iso;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Strategy {
    pub id: i64,
    pub strategy_name: String,
    pub status: StrategyStatus,
    pub required_roles: Vec<String>,
    pub min_approvals: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GovernanceRecord {
    pub id: i64,
    pub strategy_name: String,
    pub role: String,
    pub reviewer: String,
    pub decision: GovernanceDecision,
    pub comment: String,
    pub decided_at: String,
}

pub struct StrategyGovStore {
    db_path: String,
}

impl StrategyGovStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = StrategyGovStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening strategy governance db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS strategies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                strategy_name TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                required_roles TEXT NOT NULL,
                min_approvals INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS governance_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                strategy_name TEXT NOT NULL,
                role TEXT NOT NULL,
                reviewer TEXT NOT NULL,
                decision TEXT NOT NULL,
                comment TEXT NOT NULL,
                decided_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_gov_strategy_role ON governance_records(strategy_name, role, id DESC)",
            [],
        )?;
        Ok(())
    }

    pub fn create_strategy(&self, strategy_name: &str, required_roles: &[String], min_approvals: i64) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO strategies(strategy_name, status, required_roles, min_approvals)
             VALUES (?1, 'DRAFT', ?2, ?3)",
            params![strategy_name, serde_json::to_string(required_roles)?, min_approvals],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_strategy(&self, strategy_name: &str) -> Result<Option<Strategy>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, strategy_name, status, required_roles, min_approvals FROM strategies WHERE strategy_name = ?1",
            params![strategy_name],
            Self::row_to_strategy,
        )
        .optional()
        .context("fetching strategy")
    }

    pub fn set_status(&self, strategy_name: &str, status: StrategyStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE strategies SET status = ?1 WHERE strategy_name = ?2",
            params![status_str(status), strategy_name],
        )?;
        Ok(())
    }

    /// Appends one role decision. Does not itself recompute the strategy's aggregate
    /// status; `StrategyGovernance::decide` (src/strategy_governance.rs) does that by
    /// re-reading `latest_decisions_by_role` after the insert.
    pub fn record_decision(
        &self,
        strategy_name: &str,
        role: &str,
        reviewer: &str,
        decision: GovernanceDecision,
        comment: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO governance_records(strategy_name, role, reviewer, decision, comment, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                strategy_name,
                role,
                reviewer,
                match decision {
                    GovernanceDecision::Approve => "APPROVE",
                    GovernanceDecision::Reject => "REJECT",
                },
                comment,
                now_iso()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Latest decision per role, via self-join on MAX(id) GROUP BY role — only the
    /// most recent reviewer action for each role counts toward the approval quorum.
    pub fn latest_decisions_by_role(&self, strategy_name: &str) -> Result<Vec<GovernanceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT g.id, g.strategy_name, g.role, g.reviewer, g.decision, g.comment, g.decided_at
             FROM governance_records g
             INNER JOIN (
                 SELECT role, MAX(id) AS max_id FROM governance_records
                 WHERE strategy_name = ?1 GROUP BY role
             ) latest ON g.role = latest.role AND g.id = latest.max_id
             WHERE g.strategy_name = ?1",
        )?;
        let rows = stmt.query_map(params![strategy_name], Self::row_to_record)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn history(&self, strategy_name: &str, limit: i64) -> Result<Vec<GovernanceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, strategy_name, role, reviewer, decision, comment, decided_at
             FROM governance_records WHERE strategy_name = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![strategy_name, limit.clamp(1, 5000)], Self::row_to_record)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn row_to_strategy(r: &rusqlite::Row) -> rusqlite::Result<Strategy> {
        let status: String = r.get(2)?;
        let roles: String = r.get(3)?;
        Ok(Strategy {
            id: r.get(0)?,
            strategy_name: r.get(1)?,
            status: parse_status(&status),
            required_roles: serde_json::from_str(&roles).unwrap_or_default(),
            min_approvals: r.get(4)?,
        })
    }

    fn row_to_record(r: &rusqlite::Row) -> rusqlite::Result<GovernanceRecord> {
        let decision: String = r.get(4)?;
        Ok(GovernanceRecord {
            id: r.get(0)?,
            strategy_name: r.get(1)?,
            role: r.get(2)?,
            reviewer: r.get(3)?,
            decision: if decision == "APPROVE" {
                GovernanceDecision::Approve
            } else {
                GovernanceDecision::Reject
            },
            comment: r.get(5)?,
            decided_at: r.get(6)?,
        })
    }
}

fn status_str(status: StrategyStatus) -> &'static str {
    match status {
        StrategyStatus::Draft => "DRAFT",
        StrategyStatus::InReview => "IN_REVIEW",
        StrategyStatus::Approved => "APPROVED",
        StrategyStatus::Rejected => "REJECTED",
        StrategyStatus::Retired => "RETIRED",
    }
}

fn parse_status(s: &str) -> StrategyStatus {
    match s {
        "IN_REVIEW" => StrategyStatus::InReview,
        "APPROVED" => StrategyStatus::Approved,
        "REJECTED" => StrategyStatus::Rejected,
        "RETIRED" => StrategyStatus::Retired,
        _ => StrategyStatus::Draft,
    }
}
