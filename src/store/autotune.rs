//! Autotune profile lifecycle store. Grounded on
//! `autotune/store.py`. A profile is keyed by (strategy, scope, symbol_key); only one
//! row per key may be active at a time, with prior active rows demoted to historical.

use crate::domain::AutotuneScope;
use crate::util::now_iso;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AutotuneProfile {
    pub id: i64,
    pub strategy_name: String,
    pub scope: AutotuneScope,
    /// Empty string for global scope; a concrete symbol for symbol scope.
    pub symbol_key: String,
    pub params_json: String,
    pub is_active: bool,
    pub created_at: String,
    pub created_by: String,
    pub note: String,
}

pub struct AutotuneStore {
    db_path: String,
}

impl AutotuneStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = AutotuneStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening autotune db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS autotune_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                scope TEXT NOT NULL,
                symbol_key TEXT NOT NULL,
                params_json TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                created_by TEXT NOT NULL,
                note TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_autotune_key
             ON autotune_profiles(strategy_name, scope, symbol_key, id DESC)",
            [],
        )?;
        Ok(())
    }

    /// Inserts a new profile as active, demoting any previously active row sharing
    /// the same (strategy, scope, symbol_key) key to historical.
    pub fn activate(
        &self,
        strategy_name: &str,
        scope: AutotuneScope,
        symbol_key: &str,
        params_json: &str,
        created_by: &str,
        note: &str,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let scope_str = scope_str(scope);
        tx.execute(
            "UPDATE autotune_profiles SET is_active = 0
             WHERE strategy_name = ?1 AND scope = ?2 AND symbol_key = ?3 AND is_active = 1",
            params![strategy_name, scope_str, symbol_key],
        )?;
        tx.execute(
            "INSERT INTO autotune_profiles(created_at, strategy_name, scope, symbol_key, params_json, is_active, created_by, note)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
            params![now_iso(), strategy_name, scope_str, symbol_key, params_json, created_by, note],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Demotes the current active row for the key and reactivates the row that was
    /// active immediately before it, if any. Returns the id reactivated, or None if
    /// there was nothing to roll back to.
    pub fn rollback(&self, strategy_name: &str, scope: AutotuneScope, symbol_key: &str) -> Result<Option<i64>> {
        let scope_str = scope_str(scope);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM autotune_profiles
                 WHERE strategy_name = ?1 AND scope = ?2 AND symbol_key = ?3 AND is_active = 1",
                params![strategy_name, scope_str, symbol_key],
                |r| r.get(0),
            )
            .optional()?;
        let Some(current_id) = current_id else {
            tx.commit()?;
            return Ok(None);
        };
        let previous_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM autotune_profiles
                 WHERE strategy_name = ?1 AND scope = ?2 AND symbol_key = ?3 AND id < ?4
                 ORDER BY id DESC LIMIT 1",
                params![strategy_name, scope_str, symbol_key, current_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(previous_id) = previous_id else {
            tx.commit()?;
            return Ok(None);
        };
        tx.execute(
            "UPDATE autotune_profiles SET is_active = 0 WHERE id = ?1",
            params![current_id],
        )?;
        tx.execute(
            "UPDATE autotune_profiles SET is_active = 1 WHERE id = ?1",
            params![previous_id],
        )?;
        tx.commit()?;
        Ok(Some(previous_id))
    }

    /// Symbol-scoped active profile first, falling back to the global (empty
    /// symbol_key) active profile, per the documented rollout rules.
    pub fn active_for_symbol(&self, strategy_name: &str, symbol: &str) -> Result<Option<AutotuneProfile>> {
        if let Some(p) = self.active(strategy_name, AutotuneScope::Symbol, symbol)? {
            return Ok(Some(p));
        }
        self.active(strategy_name, AutotuneScope::Global, "")
    }

    pub fn active(&self, strategy_name: &str, scope: AutotuneScope, symbol_key: &str) -> Result<Option<AutotuneProfile>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, created_at, strategy_name, scope, symbol_key, params_json, is_active, created_by, note
             FROM autotune_profiles
             WHERE strategy_name = ?1 AND scope = ?2 AND symbol_key = ?3 AND is_active = 1",
            params![strategy_name, scope_str(scope), symbol_key],
            Self::row_to_profile,
        )
        .optional()
        .context("fetching active autotune profile")
    }

    pub fn history(&self, strategy_name: &str, scope: AutotuneScope, symbol_key: &str, limit: i64) -> Result<Vec<AutotuneProfile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, strategy_name, scope, symbol_key, params_json, is_active, created_by, note
             FROM autotune_profiles
             WHERE strategy_name = ?1 AND scope = ?2 AND symbol_key = ?3
             ORDER BY id DESC LIMIT ?4",
        )?;
        let rows = stmt.query_map(
            params![strategy_name, scope_str(scope), symbol_key, limit.clamp(1, 2000)],
            Self::row_to_profile,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn row_to_profile(r: &rusqlite::Row) -> rusqlite::Result<AutotuneProfile> {
        let scope: String = r.get(3)?;
        Ok(AutotuneProfile {
            id: r.get(0)?,
            created_at: r.get(1)?,
            strategy_name: r.get(2)?,
            scope: if scope == "symbol" {
                AutotuneScope::Symbol
            } else {
                AutotuneScope::Global
            },
            symbol_key: r.get(4)?,
            params_json: r.get(5)?,
            is_active: r.get::<_, i64>(6)? != 0,
            created_by: r.get(7)?,
            note: r.get(8)?,
        })
    }
}

fn scope_str(scope: AutotuneScope) -> &'static str {
    match scope {
        AutotuneScope::Global => "global",
        AutotuneScope::Symbol => "symbol",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AutotuneStore {
        let file = tempfile::NamedTempFile::new().unwrap();
        AutotuneStore::new(file.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn activating_demotes_previous_and_rollback_restores_it() {
        let store = store();
        let first = store
            .activate("trend_follow", AutotuneScope::Global, "", "{\"a\":1}", "ops", "initial")
            .unwrap();
        let second = store
            .activate("trend_follow", AutotuneScope::Global, "", "{\"a\":2}", "ops", "tuned")
            .unwrap();
        assert!(store.active("trend_follow", AutotuneScope::Global, "").unwrap().unwrap().id == second);

        let rolled = store.rollback("trend_follow", AutotuneScope::Global, "").unwrap();
        assert_eq!(rolled, Some(first));
        assert_eq!(store.active("trend_follow", AutotuneScope::Global, "").unwrap().unwrap().id, first);
    }

    #[test]
    fn symbol_scope_falls_back_to_global() {
        let store = store();
        store
            .activate("trend_follow", AutotuneScope::Global, "", "{\"a\":1}", "ops", "")
            .unwrap();
        let resolved = store.active_for_symbol("trend_follow", "000001").unwrap().unwrap();
        assert_eq!(resolved.scope, AutotuneScope::Global);
    }
}
