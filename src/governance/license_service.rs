//! Thin service wrapper around `store::license`.

use crate::store::license::{check_license, License, LicenseCheckResult, LicenseStore};
use anyhow::Result;
use chrono::NaiveDate;

pub struct LicenseService {
    store: LicenseStore,
}

impl LicenseService {
    pub fn new(store: LicenseStore) -> Self {
        LicenseService { store }
    }

    pub fn register(&self, license: &License) -> Result<i64> {
        self.store.create(license)
    }

    pub fn check(
        &self,
        dataset_name: &str,
        provider: &str,
        usage: &str,
        export_requested: bool,
        expected_rows: Option<i64>,
        as_of: NaiveDate,
    ) -> Result<LicenseCheckResult> {
        check_license(
            &self.store,
            dataset_name,
            provider,
            usage,
            export_requested,
            expected_rows,
            as_of,
        )
    }
}
