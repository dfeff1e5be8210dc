// src/probe/pools.rs
use async_trait::async_trait;
use serde::Deserialize;

use super::{contains_any_ignore_case, lenient, Probe, ProbeError, ProbeSuccess};
use crate::fetch::RetryingFetcher;

pub const DEFAULT_MIN_TVL_USD: f64 = 100_000.0;
pub const DEFAULT_MAX_APY: f64 = 200.0;
pub const DEFAULT_POOL_CAP: usize = 50;

pub const EULER_PROJECTS: &[&str] = &["euler-v2", "euler"];
pub const STABLE_TICKERS: &[&str] = &["USDC", "USDT", "DAI", "USDS", "PYUSD", "FRAX", "LUSD"];

/// One entry of the pools feed (`{"data": [...]}`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    #[serde(default, deserialize_with = "lenient")]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub stablecoin: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub tvl_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub apy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PoolsFeed {
    data: Vec<Pool>,
}

async fn fetch_pools(fetcher: &RetryingFetcher, url: &str) -> Result<Vec<Pool>, ProbeError> {
    let raw = fetcher.get_json(url).await?;
    let feed: PoolsFeed = serde_json::from_value(raw).map_err(ProbeError::payload)?;
    Ok(feed.data)
}

/// Liquidity and sanity bounds shared by the pool-based sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolFilter {
    pub min_tvl_usd: f64,
    pub max_apy: f64,
}

impl Default for PoolFilter {
    fn default() -> Self {
        Self {
            min_tvl_usd: DEFAULT_MIN_TVL_USD,
            max_apy: DEFAULT_MAX_APY,
        }
    }
}

impl PoolFilter {
    /// `tvlUsd > min AND apy < max`; a missing field never passes.
    pub fn accepts(&self, pool: &Pool) -> bool {
        let liquid = matches!(pool.tvl_usd, Some(tvl) if tvl > self.min_tvl_usd);
        let sane = matches!(pool.apy, Some(apy) if apy < self.max_apy);
        liquid && sane
    }
}

/// Stablecoin pools across the whole feed.
#[derive(Debug, Clone)]
pub struct PoolProbe {
    pub url: String,
    pub filter: PoolFilter,
    pub cap: usize,
}

impl PoolProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filter: PoolFilter::default(),
            cap: DEFAULT_POOL_CAP,
        }
    }

    pub fn qualifies(&self, pool: &Pool) -> bool {
        pool.stablecoin == Some(true) && self.filter.accepts(pool)
    }

    pub fn count_qualifying(&self, pools: &[Pool]) -> u64 {
        pools
            .iter()
            .filter(|p| self.qualifies(p))
            .take(self.cap)
            .count() as u64
    }
}

#[async_trait]
impl Probe for PoolProbe {
    async fn run(&self, fetcher: &RetryingFetcher) -> Result<ProbeSuccess, ProbeError> {
        let pools = fetch_pools(fetcher, &self.url).await?;
        let count = self.count_qualifying(&pools);
        // sample comes from the raw feed, not the filtered set
        let sample = pools.first().and_then(|p| p.project.clone());
        Ok(ProbeSuccess::new(count).with_sample(sample))
    }
}

/// Pools of one protocol (under any of its project aliases) whose symbol
/// names a known stablecoin.
#[derive(Debug, Clone)]
pub struct ProjectPoolProbe {
    pub url: String,
    pub projects: Vec<String>,
    pub tickers: Vec<String>,
    pub filter: PoolFilter,
}

impl ProjectPoolProbe {
    pub fn new(url: impl Into<String>, projects: &[&str], tickers: &[&str]) -> Self {
        Self {
            url: url.into(),
            projects: projects.iter().map(|s| s.to_string()).collect(),
            tickers: tickers.iter().map(|s| s.to_string()).collect(),
            filter: PoolFilter::default(),
        }
    }

    pub fn euler(url: impl Into<String>) -> Self {
        Self::new(url, EULER_PROJECTS, STABLE_TICKERS)
    }

    fn is_candidate(&self, pool: &Pool) -> bool {
        let project_ok = pool
            .project
            .as_deref()
            .is_some_and(|p| self.projects.iter().any(|alias| alias == p));
        project_ok && self.filter.accepts(pool)
    }

    fn has_stable_symbol(&self, pool: &Pool) -> bool {
        pool.symbol
            .as_deref()
            .is_some_and(|s| contains_any_ignore_case(s, &self.tickers))
    }

    /// Returns `(qualifying, candidates)`; candidates pass project and
    /// liquidity bounds but not necessarily the symbol check.
    pub fn count_qualifying(&self, pools: &[Pool]) -> (u64, u64) {
        let candidates: Vec<&Pool> = pools.iter().filter(|p| self.is_candidate(p)).collect();
        let qualifying = candidates
            .iter()
            .filter(|p| self.has_stable_symbol(p))
            .count();
        (qualifying as u64, candidates.len() as u64)
    }
}

#[async_trait]
impl Probe for ProjectPoolProbe {
    async fn run(&self, fetcher: &RetryingFetcher) -> Result<ProbeSuccess, ProbeError> {
        let pools = fetch_pools(fetcher, &self.url).await?;
        let (count, candidates) = self.count_qualifying(&pools);
        Ok(ProbeSuccess::new(count).with_total(candidates))
    }
}
