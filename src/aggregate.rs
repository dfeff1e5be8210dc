// src/aggregate.rs
//! Fan-out/fan-in over all configured sources.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{join_all, FutureExt};
use metrics::{counter, histogram};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::fetch::RetryingFetcher;
use crate::metrics::ensure_metrics_described;
use crate::probe::{Probe, ProbeResult, SourceSpec};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no sources configured")]
    NoSources,
}

/// Source name → result, in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceResults(Vec<(String, ProbeResult)>);

impl SourceResults {
    pub fn get(&self, source: &str) -> Option<&ProbeResult> {
        self.0.iter().find(|(n, _)| n == source).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeResult)> {
        self.0.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ProbeResult)> for SourceResults {
    fn from_iter<I: IntoIterator<Item = (String, ProbeResult)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for SourceResults {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(self.0.iter().map(|(n, r)| (n, r)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_yields: u64,
    pub successful_sources: usize,
    pub failed_sources: usize,
    pub sources: usize,
}

impl Summary {
    pub fn from_results(results: &SourceResults) -> Self {
        results.iter().fold(
            Summary {
                sources: results.len(),
                ..Summary::default()
            },
            |mut acc, (_, r)| {
                match r.count() {
                    Some(n) => {
                        acc.successful_sources += 1;
                        acc.total_yields += n;
                    }
                    None => acc.failed_sources += 1,
                }
                acc
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub results: SourceResults,
    pub summary: Summary,
}

impl AggregateReport {
    pub fn new(results: SourceResults) -> Self {
        let summary = Summary::from_results(&results);
        Self { results, summary }
    }
}

/// Report plus timing of the run that produced it.
#[derive(Debug, Clone)]
pub struct DiagnosticRun {
    pub report: AggregateReport,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

pub struct Aggregator {
    fetcher: Arc<RetryingFetcher>,
    sources: Vec<SourceSpec>,
    probe_timeout: Option<Duration>,
}

impl Aggregator {
    pub fn new(fetcher: Arc<RetryingFetcher>, sources: Vec<SourceSpec>) -> Self {
        Self {
            fetcher,
            sources,
            probe_timeout: None,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Probe every source concurrently; one source failing never affects the
    /// others.
    pub async fn run_diagnostics(&self) -> Result<DiagnosticRun, AggregateError> {
        if self.sources.is_empty() {
            return Err(AggregateError::NoSources);
        }
        ensure_metrics_described();

        let started_at = Utc::now();
        let t0 = Instant::now();

        let outcomes = join_all(self.sources.iter().map(|s| self.run_source(s))).await;
        let results: SourceResults = self
            .sources
            .iter()
            .map(|s| s.name.clone())
            .zip(outcomes)
            .collect();
        let report = AggregateReport::new(results);
        let elapsed = t0.elapsed();

        counter!("diagnostics_runs_total").increment(1);
        histogram!("diagnostics_run_ms").record(elapsed.as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "diagnostics",
            total_yields = report.summary.total_yields,
            ok = report.summary.successful_sources,
            failed = report.summary.failed_sources,
            elapsed_ms = elapsed.as_millis() as u64,
            "diagnostics run finished"
        );

        Ok(DiagnosticRun {
            report,
            started_at,
            elapsed,
        })
    }

    async fn run_source(&self, spec: &SourceSpec) -> ProbeResult {
        let fut = AssertUnwindSafe(spec.probe.probe(&self.fetcher)).catch_unwind();
        let outcome = match self.probe_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(o) => o,
                Err(_) => Ok(ProbeResult::failure(format!(
                    "probe timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => fut.await,
        };

        let result = outcome.unwrap_or_else(|panic| {
            ProbeResult::failure(format!("probe panicked: {}", panic_message(&*panic)))
        });

        if let Some(err) = result.error() {
            tracing::warn!(target: "diagnostics", source = %spec.name, error = %err, "source probe failed");
            counter!("diagnostics_source_failures_total", "source" => spec.name.clone())
                .increment(1);
        }
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
