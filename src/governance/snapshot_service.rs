//! Thin service wrapper around `store::snapshot`.

use crate::store::snapshot::{SnapshotRecord, SnapshotStore};
use crate::util::canonical_json;
use anyhow::Result;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};

pub struct SnapshotService {
    store: SnapshotStore,
}

impl SnapshotService {
    pub fn new(store: SnapshotStore) -> Self {
        SnapshotService { store }
    }

    /// Registers the dataset range a downstream consumer read, hashed over the
    /// canonical JSON of its content so re-reading identical data is idempotent.
    pub fn register(
        &self,
        dataset_name: &str,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        provider: &str,
        schema_version: &str,
        content: &serde_json::Value,
    ) -> Result<i64> {
        let canonical = canonical_json(content);
        let content_hash = hex::encode(Sha256::digest(canonical.as_bytes()));
        let row_count = content.as_array().map(|a| a.len()).unwrap_or(1) as i64;
        self.store.register(
            dataset_name,
            symbol,
            start_date,
            end_date,
            provider,
            row_count,
            schema_version,
            &content_hash,
        )
    }

    pub fn get(&self, id: i64) -> Result<Option<SnapshotRecord>> {
        self.store.get(id)
    }
}
