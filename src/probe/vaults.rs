// src/probe/vaults.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{lenient, Probe, ProbeError, ProbeSuccess};
use crate::fetch::RetryingFetcher;

pub const DEFAULT_VAULT_CHAINS: &[u64] = &[1, 8453];
pub const DEFAULT_VAULT_PAGE: u32 = 100;
pub const DEFAULT_MIN_TOTAL_ASSETS_USD: f64 = 100_000.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub total_assets_usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<VaultData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct VaultData {
    #[serde(rename = "vaultV2s", default)]
    vaults: Option<VaultPage>,
}

#[derive(Debug, Deserialize)]
struct VaultPage {
    #[serde(default)]
    items: Option<Vec<Vault>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

/// Curated vaults from a GraphQL API, restricted to an allow-list of chains.
#[derive(Debug, Clone)]
pub struct VaultProbe {
    pub url: String,
    pub chain_ids: Vec<u64>,
    pub page_size: u32,
    pub min_total_assets_usd: f64,
}

impl VaultProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            chain_ids: DEFAULT_VAULT_CHAINS.to_vec(),
            page_size: DEFAULT_VAULT_PAGE,
            min_total_assets_usd: DEFAULT_MIN_TOTAL_ASSETS_USD,
        }
    }

    pub fn query(&self) -> String {
        let chains = self
            .chain_ids
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{{ vaultV2s(first: {}, where: {{ chainId_in: [{}], whitelisted: true }}) {{ \
             items {{ address name symbol totalAssetsUsd avgNetApy asset {{ symbol }} chain {{ network }} }} }} }}",
            self.page_size, chains
        )
    }

    pub fn qualifies(&self, vault: &Vault) -> bool {
        matches!(vault.total_assets_usd, Some(usd) if usd > self.min_total_assets_usd)
    }

    fn summarize(&self, resp: GraphQlResponse) -> Result<ProbeSuccess, ProbeError> {
        let errors = resp.errors.unwrap_or_default();
        let Some(data) = resp.data else {
            if !errors.is_empty() {
                let joined = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ProbeError::GraphQl(joined));
            }
            return Ok(ProbeSuccess::new(0).with_total(0));
        };
        if !errors.is_empty() {
            tracing::warn!(
                target: "diagnostics",
                errors = errors.len(),
                "vault query returned partial data with errors"
            );
        }

        let items = data.vaults.and_then(|p| p.items).unwrap_or_default();
        let count = items.iter().filter(|v| self.qualifies(v)).count() as u64;
        let sample = items.first().and_then(|v| v.name.clone());
        Ok(ProbeSuccess::new(count)
            .with_total(items.len() as u64)
            .with_sample(sample))
    }
}

#[async_trait]
impl Probe for VaultProbe {
    async fn run(&self, fetcher: &RetryingFetcher) -> Result<ProbeSuccess, ProbeError> {
        let raw = fetcher
            .post_json(&self.url, json!({ "query": self.query() }))
            .await?;
        let resp: GraphQlResponse = serde_json::from_value(raw).map_err(ProbeError::payload)?;
        self.summarize(resp)
    }
}
