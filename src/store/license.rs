//! License store + `LicenseService::check`. Grounded on
//! `governance/license_store.py` (newest-id-wins active lookup) and
//! `governance/license_service.py` (decision order).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    #[serde(default)]
    pub id: i64,
    pub dataset_name: String,
    pub provider: String,
    pub licensor: String,
    pub usage_scopes: Vec<String>,
    pub allow_export: bool,
    pub enforce_watermark: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub max_export_rows: Option<i64>,
    pub created_by: String,
    pub note: String,
}

pub struct LicenseStore {
    db_path: String,
}

impl LicenseStore {
    pub fn new(db_path: &str) -> Result<Self> {
        super::ensure_parent_dir(db_path);
        let store = LicenseStore {
            db_path: db_path.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path).context("opening license db")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS data_licenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dataset_name TEXT NOT NULL,
                provider TEXT NOT NULL,
                licensor TEXT NOT NULL,
                usage_scopes TEXT NOT NULL,
                allow_export INTEGER NOT NULL,
                enforce_watermark TEXT,
                valid_from TEXT NOT NULL,
                valid_to TEXT,
                max_export_rows INTEGER,
                created_by TEXT NOT NULL,
                note TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_license_dataset_provider
             ON data_licenses(dataset_name, provider, id DESC)",
            [],
        )?;
        Ok(())
    }

    pub fn create(&self, lic: &License) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO data_licenses(dataset_name, provider, licensor, usage_scopes, allow_export,
                enforce_watermark, valid_from, valid_to, max_export_rows, created_by, note)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                lic.dataset_name,
                lic.provider,
                lic.licensor,
                serde_json::to_string(&lic.usage_scopes)?,
                lic.allow_export as i64,
                lic.enforce_watermark,
                lic.valid_from.to_string(),
                lic.valid_to.map(|d| d.to_string()),
                lic.max_export_rows,
                lic.created_by,
                lic.note,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest id wins among licenses active for (dataset, provider, as_of).
    pub fn latest_active(
        &self,
        dataset_name: &str,
        provider: &str,
        as_of: NaiveDate,
    ) -> Result<Option<License>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, dataset_name, provider, licensor, usage_scopes, allow_export,
                    enforce_watermark, valid_from, valid_to, max_export_rows, created_by, note
             FROM data_licenses
             WHERE dataset_name = ?1 AND provider = ?2 AND valid_from <= ?3
               AND (valid_to IS NULL OR valid_to >= ?3)
             ORDER BY id DESC LIMIT 1",
            params![dataset_name, provider, as_of.to_string()],
            Self::row_to_license,
        )
        .optional()
        .context("fetching latest active license")
    }

    fn row_to_license(r: &rusqlite::Row) -> rusqlite::Result<License> {
        let usage_scopes: String = r.get(4)?;
        Ok(License {
            id: r.get(0)?,
            dataset_name: r.get(1)?,
            provider: r.get(2)?,
            licensor: r.get(3)?,
            usage_scopes: serde_json::from_str(&usage_scopes).unwrap_or_default(),
            allow_export: r.get::<_, i64>(5)? != 0,
            enforce_watermark: r.get(6)?,
            valid_from: r.get::<_, String>(7)?.parse().unwrap(),
            valid_to: r.get::<_, Option<String>>(8)?.and_then(|s| s.parse().ok()),
            max_export_rows: r.get(9)?,
            created_by: r.get(10)?,
            note: r.get(11)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseCheckResult {
    pub allowed: bool,
    pub reason: String,
    pub watermark: String,
}

const DEFAULT_WATERMARK: &str = "For Research Only";

/// `LicenseService::check`. Decision order: no-match -> scope ->
/// export-allowed -> export-row-cap -> allowed. Watermark is always populated so
/// callers can stamp exports even on denial.
pub fn check_license(
    store: &LicenseStore,
    dataset_name: &str,
    provider: &str,
    usage: &str,
    export_requested: bool,
    expected_rows: Option<i64>,
    as_of: NaiveDate,
) -> Result<LicenseCheckResult> {
    let license = store.latest_active(dataset_name, provider, as_of)?;
    let Some(license) = license else {
        return Ok(LicenseCheckResult {
            allowed: false,
            reason: "no_active_license".to_string(),
            watermark: DEFAULT_WATERMARK.to_string(),
        });
    };
    let watermark = license
        .enforce_watermark
        .clone()
        .unwrap_or_else(|| DEFAULT_WATERMARK.to_string());

    if !license.usage_scopes.is_empty() && !license.usage_scopes.iter().any(|s| s == usage) {
        return Ok(LicenseCheckResult {
            allowed: false,
            reason: format!("usage_scope_not_allowed:{usage}"),
            watermark,
        });
    }
    if export_requested && !license.allow_export {
        return Ok(LicenseCheckResult {
            allowed: false,
            reason: "export_not_allowed".to_string(),
            watermark,
        });
    }
    if export_requested {
        if let (Some(max_rows), Some(rows)) = (license.max_export_rows, expected_rows) {
            if rows > max_rows {
                return Ok(LicenseCheckResult {
                    allowed: false,
                    reason: "export_rows_exceeded".to_string(),
                    watermark,
                });
            }
        }
    }
    Ok(LicenseCheckResult {
        allowed: true,
        reason: "ok".to_string(),
        watermark,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LicenseStore {
        let file = tempfile::NamedTempFile::new().unwrap();
        LicenseStore::new(file.path().to_str().unwrap()).unwrap()
    }

    fn sample_license(allow_export: bool) -> License {
        License {
            id: 0,
            dataset_name: "audit_events".to_string(),
            provider: "tushare".to_string(),
            licensor: "vendor".to_string(),
            usage_scopes: vec!["research".to_string()],
            allow_export,
            enforce_watermark: None,
            valid_from: "2020-01-01".parse().unwrap(),
            valid_to: None,
            max_export_rows: Some(1000),
            created_by: "ops".to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn export_denied_when_license_disallows_export() {
        let store = store();
        store.create(&sample_license(false)).unwrap();
        let result = check_license(
            &store,
            "audit_events",
            "tushare",
            "research",
            true,
            Some(10),
            "2024-01-01".parse().unwrap(),
        )
        .unwrap();
        assert!(!result.allowed);
        assert_eq!(result.reason, "export_not_allowed");
    }

    #[test]
    fn no_license_returns_no_active_license() {
        let store = store();
        let result = check_license(
            &store,
            "audit_events",
            "tushare",
            "research",
            false,
            None,
            "2024-01-01".parse().unwrap(),
        )
        .unwrap();
        assert!(!result.allowed);
        assert_eq!(result.reason, "no_active_license");
        assert_eq!(result.watermark, DEFAULT_WATERMARK);
    }
}
