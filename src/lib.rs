// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod probe;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{AggregateReport, Aggregator, DiagnosticRun, Summary};
pub use crate::api::{router, AppState};
pub use crate::classify::{Classifier, ExpectationTable, Recommendation, Verdict};
pub use crate::config::DiagnosticsConfig;
pub use crate::fetch::{RetryPolicy, RetryingFetcher};
pub use crate::probe::{ProbeResult, SourceSpec};

/// Build the diagnostics router for a loaded configuration.
///
/// Does not install the metrics recorder; the binary does that once.
pub fn app(cfg: &DiagnosticsConfig) -> anyhow::Result<axum::Router> {
    let state = AppState::from_config(cfg)?;
    Ok(router(state))
}
