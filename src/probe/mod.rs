// src/probe/mod.rs
//! Source probes: one variant per upstream API shape, each with its own
//! normalization and filter rules.

pub mod manual;
pub mod markets;
pub mod pools;
pub mod types;
pub mod vaults;

pub use manual::StaticProbe;
pub use markets::{MarketProbe, Partition};
pub use pools::{PoolFilter, PoolProbe, ProjectPoolProbe};
pub use types::{PartitionCount, PartitionCounts, ProbeResult, ProbeSuccess};
pub use vaults::VaultProbe;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::config::DiagnosticsConfig;
use crate::fetch::{FetchError, RetryingFetcher};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected payload: {0}")]
    Payload(String),
    #[error("GraphQL error: {0}")]
    GraphQl(String),
}

impl ProbeError {
    pub(crate) fn payload(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Fetch and normalize; any error is the whole source's failure.
    async fn run(&self, fetcher: &RetryingFetcher) -> Result<ProbeSuccess, ProbeError>;

    async fn probe(&self, fetcher: &RetryingFetcher) -> ProbeResult {
        match self.run(fetcher).await {
            Ok(s) => ProbeResult::Success(s),
            Err(e) => ProbeResult::failure(e.to_string()),
        }
    }
}

/// The closed set of probe kinds the harness knows how to run.
#[derive(Debug, Clone)]
pub enum SourceProbe {
    Pools(PoolProbe),
    Vaults(VaultProbe),
    ProjectPools(ProjectPoolProbe),
    Markets(MarketProbe),
    Static(StaticProbe),
}

#[async_trait]
impl Probe for SourceProbe {
    async fn run(&self, fetcher: &RetryingFetcher) -> Result<ProbeSuccess, ProbeError> {
        match self {
            Self::Pools(p) => p.run(fetcher).await,
            Self::Vaults(p) => p.run(fetcher).await,
            Self::ProjectPools(p) => p.run(fetcher).await,
            Self::Markets(p) => p.run(fetcher).await,
            Self::Static(p) => p.run(fetcher).await,
        }
    }
}

/// A named source; the name is the key in the report.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub name: String,
    pub probe: SourceProbe,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, probe: SourceProbe) -> Self {
        Self {
            name: name.into(),
            probe,
        }
    }
}

/// The five reference sources, in report order.
pub fn sources_from_config(cfg: &DiagnosticsConfig) -> Vec<SourceSpec> {
    let ep = &cfg.endpoints;
    vec![
        SourceSpec::new(
            "defiLlama",
            SourceProbe::Pools(PoolProbe::new(ep.pools_url.clone())),
        ),
        SourceSpec::new(
            "morpho",
            SourceProbe::Vaults(VaultProbe::new(ep.graphql_url.clone())),
        ),
        SourceSpec::new(
            "euler",
            SourceProbe::ProjectPools(ProjectPoolProbe::euler(ep.pools_url.clone())),
        ),
        SourceSpec::new(
            "pendle",
            SourceProbe::Markets(MarketProbe::new(ep.markets_url_template.clone())),
        ),
        SourceSpec::new("manual", SourceProbe::Static(StaticProbe::new(cfg.manual.count))),
    ]
}

/// Deserialize a field as `Some(T)` only when present and well-typed; anything
/// else becomes `None` instead of failing the whole payload.
pub(crate) fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

pub(crate) fn contains_any_ignore_case(haystack: &str, needles: &[String]) -> bool {
    let upper = haystack.to_ascii_uppercase();
    needles
        .iter()
        .any(|n| upper.contains(n.to_ascii_uppercase().as_str()))
}
