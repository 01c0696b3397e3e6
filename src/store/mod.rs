pub mod alert;
pub mod audit;
pub mod autotune;
pub mod event;
pub mod holdings;
pub mod job;
pub mod license;
pub mod market_cache;
pub mod replay;
pub mod snapshot;
pub mod strategy_gov;

pub(crate) fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
