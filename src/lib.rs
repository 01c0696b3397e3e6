//! Library surface for the A-share trading assistant governance backbone.
//! `main.rs` wires these modules into an `AppState` and an axum router; tests and
//! other binaries can depend on this crate directly.

pub mod alerts;
pub mod api;
pub mod autotune;
pub mod config;
pub mod auth;
pub mod data;
pub mod domain;
pub mod error;
pub mod events;
pub mod factors;
pub mod fundamentals;
pub mod governance;
pub mod holdings;
pub mod ops;
pub mod pipelines;
pub mod replay;
pub mod risk;
pub mod state;
pub mod store;
pub mod strategy;
pub mod strategy_governance;
pub mod trading;
pub mod util;
