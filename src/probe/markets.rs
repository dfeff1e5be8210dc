// src/probe/markets.rs
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::{
    contains_any_ignore_case, lenient, PartitionCount, PartitionCounts, Probe, ProbeError,
    ProbeSuccess,
};
use crate::fetch::RetryingFetcher;

pub const CHAIN_ID_PLACEHOLDER: &str = "{chain_id}";
pub const DEFAULT_MIN_LIQUIDITY: f64 = 10_000.0;
pub const STABLE_MARKERS: &[&str] = &["USD", "DAI", "USDC", "USDT"];

/// One independently queried chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub chain_id: u64,
    pub name: String,
}

impl Partition {
    pub fn new(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
        }
    }
}

pub fn default_partitions() -> Vec<Partition> {
    vec![
        Partition::new(1, "Ethereum"),
        Partition::new(42161, "Arbitrum"),
        Partition::new(10, "Optimism"),
    ]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRef {
    #[serde(default, deserialize_with = "lenient")]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    #[serde(default, deserialize_with = "lenient")]
    pub underlying_asset: Option<TokenRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub pt: Option<TokenRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_active_liquidity: Option<f64>,
}

impl Market {
    /// Underlying symbol, falling back to the principal token's; empty when
    /// neither is set.
    pub fn symbol(&self) -> &str {
        [&self.underlying_asset, &self.pt]
            .into_iter()
            .filter_map(|t| t.as_ref().and_then(|t| t.symbol.as_deref()))
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
struct MarketsPage {
    #[serde(default, deserialize_with = "lenient")]
    results: Option<Vec<Market>>,
}

/// Stablecoin markets, queried chain by chain. A failing chain is reported
/// inline and does not fail the source.
#[derive(Debug, Clone)]
pub struct MarketProbe {
    pub url_template: String,
    pub partitions: Vec<Partition>,
    pub markers: Vec<String>,
    pub min_liquidity: f64,
}

impl MarketProbe {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            partitions: default_partitions(),
            markers: STABLE_MARKERS.iter().map(|s| s.to_string()).collect(),
            min_liquidity: DEFAULT_MIN_LIQUIDITY,
        }
    }

    pub fn with_partitions(mut self, partitions: Vec<Partition>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn url_for(&self, partition: &Partition) -> String {
        self.url_template
            .replace(CHAIN_ID_PLACEHOLDER, &partition.chain_id.to_string())
    }

    pub fn qualifies(&self, market: &Market) -> bool {
        let stable = contains_any_ignore_case(market.symbol(), &self.markers);
        let liquid = market.total_active_liquidity.unwrap_or(0.0) > self.min_liquidity;
        stable && liquid
    }

    async fn probe_partition(
        &self,
        fetcher: &RetryingFetcher,
        partition: &Partition,
    ) -> Result<u64, ProbeError> {
        let raw = fetcher.get_json(&self.url_for(partition)).await?;
        let page: MarketsPage = serde_json::from_value(raw).map_err(ProbeError::payload)?;
        let count = page
            .results
            .unwrap_or_default()
            .iter()
            .filter(|m| self.qualifies(m))
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl Probe for MarketProbe {
    async fn run(&self, fetcher: &RetryingFetcher) -> Result<ProbeSuccess, ProbeError> {
        let outcomes = join_all(
            self.partitions
                .iter()
                .map(|p| self.probe_partition(fetcher, p)),
        )
        .await;

        let mut by_partition = PartitionCounts::new();
        for (partition, outcome) in self.partitions.iter().zip(outcomes) {
            let entry = match outcome {
                Ok(n) => PartitionCount::Count(n),
                Err(e) => {
                    tracing::warn!(
                        target: "diagnostics",
                        partition = %partition.name,
                        chain_id = partition.chain_id,
                        error = %e,
                        "partition probe failed"
                    );
                    PartitionCount::Error(e.to_string())
                }
            };
            by_partition.push(partition.name.clone(), entry);
        }

        Ok(ProbeSuccess::new(by_partition.total()).with_partitions(by_partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn market(v: serde_json::Value) -> Market {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn symbol_falls_back_to_pt_when_underlying_empty() {
        let m = market(json!({ "underlyingAsset": { "symbol": "" }, "pt": { "symbol": "PT-sUSDe" } }));
        assert_eq!(m.symbol(), "PT-sUSDe");
        assert_eq!(market(json!({})).symbol(), "");
    }

    #[test]
    fn qualifies_needs_marker_and_liquidity() {
        let probe = MarketProbe::new("https://api.invalid/{chain_id}/markets");
        assert!(probe.qualifies(&market(
            json!({ "underlyingAsset": { "symbol": "sdai" }, "totalActiveLiquidity": 20000.0 })
        )));
        assert!(!probe.qualifies(&market(
            json!({ "underlyingAsset": { "symbol": "USDC" }, "totalActiveLiquidity": 10000 })
        )));
        assert!(!probe.qualifies(&market(json!({ "underlyingAsset": { "symbol": "USDC" } }))));
        assert!(!probe.qualifies(&market(
            json!({ "underlyingAsset": { "symbol": "stETH" }, "totalActiveLiquidity": 9.9e9 })
        )));
    }

    #[test]
    fn url_substitutes_chain_id() {
        let probe = MarketProbe::new("https://api.invalid/core/v1/{chain_id}/markets");
        assert_eq!(
            probe.url_for(&Partition::new(42161, "Arbitrum")),
            "https://api.invalid/core/v1/42161/markets"
        );
    }
}
