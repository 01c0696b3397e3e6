//! `AutotuneService`. Grounded on `autotune/service.py`, wrapping
//! `store::autotune`.

use crate::domain::{AutotuneScope, JsonMap};
use crate::store::autotune::{AutotuneProfile, AutotuneStore};
use anyhow::Result;

pub struct AutotuneService {
    store: AutotuneStore,
}

impl AutotuneService {
    pub fn new(store: AutotuneStore) -> Self {
        AutotuneService { store }
    }

    pub fn activate(
        &self,
        strategy_name: &str,
        scope: AutotuneScope,
        symbol_key: &str,
        params: &JsonMap,
        created_by: &str,
        note: &str,
    ) -> Result<i64> {
        let params_json = serde_json::to_string(params)?;
        self.store.activate(strategy_name, scope, &symbol_key.to_uppercase(), &params_json, created_by, note)
    }

    pub fn rollback(&self, strategy_name: &str, scope: AutotuneScope, symbol_key: &str) -> Result<Option<i64>> {
        self.store.rollback(strategy_name, scope, &symbol_key.to_uppercase())
    }

    /// `(merged_params, profile_or_null)`: symbol-first, then global fallback,
    /// merging profile params under the caller's explicit ones.
    pub fn resolve_runtime_params(
        &self,
        strategy_name: &str,
        symbol: &str,
        explicit: &JsonMap,
        use_profile: bool,
    ) -> Result<(JsonMap, Option<AutotuneProfile>)> {
        if !use_profile {
            return Ok((explicit.clone(), None));
        }

        let profile = self.store.active_for_symbol(strategy_name, &symbol.to_uppercase())?;
        let Some(profile) = profile else {
            return Ok((explicit.clone(), None));
        };

        let mut merged: JsonMap = serde_json::from_str(&profile.params_json).unwrap_or_default();
        for (k, v) in explicit {
            merged.insert(k.clone(), v.clone());
        }
        Ok((merged, Some(profile)))
    }
}
