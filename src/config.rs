// src/config.rs
//! Service configuration: TOML file with built-in defaults and a few env overrides.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{ExpectationTable, DEFAULT_HEALTHY_FLOOR};
use crate::fetch::RetryPolicy;
use crate::probe::manual::DEFAULT_MANUAL_COUNT;

// --- env names & defaults ---
pub const DEFAULT_CONFIG_PATH: &str = "config/diagnostics.toml";
pub const ENV_CONFIG_PATH: &str = "DIAGNOSTICS_CONFIG_PATH";
pub const ENV_MAX_ATTEMPTS: &str = "DIAGNOSTICS_MAX_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "DIAGNOSTICS_RETRY_DELAY_MS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub fetch: FetchSettings,
    pub aggregate: AggregateSettings,
    pub classify: ClassifySettings,
    pub endpoints: Endpoints,
    pub expectations: ExpectationTable,
    pub manual: ManualSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Per-attempt deadline; `None` leaves requests unbounded.
    pub request_timeout_ms: Option<u64>,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay_ms: 500,
            request_timeout_ms: Some(15_000),
            connect_timeout_ms: 4_000,
            user_agent: concat!("yield-source-diagnostics/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateSettings {
    /// Upper bound for a single probe, retries included.
    pub probe_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifySettings {
    pub healthy_floor: u64,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        Self {
            healthy_floor: DEFAULT_HEALTHY_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub pools_url: String,
    pub graphql_url: String,
    /// Must contain `{chain_id}`.
    pub markets_url_template: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            pools_url: "https://yields.llama.fi/pools".into(),
            graphql_url: "https://blue-api.morpho.org/graphql".into(),
            markets_url_template: "https://api-v2.pendle.finance/core/v1/{chain_id}/markets".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualSettings {
    pub count: u64,
}

impl Default for ManualSettings {
    fn default() -> Self {
        Self {
            count: DEFAULT_MANUAL_COUNT,
        }
    }
}

impl DiagnosticsConfig {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading diagnostics config from {}", path.display()))?;
        let cfg: DiagnosticsConfig = toml::from_str(&content)
            .with_context(|| format!("parsing diagnostics config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $DIAGNOSTICS_CONFIG_PATH (must exist)
    /// 2) config/diagnostics.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        Ok(cfg.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(n) = parse_env::<u32>(ENV_MAX_ATTEMPTS) {
            self.fetch.max_attempts = n;
        }
        if let Some(ms) = parse_env::<u64>(ENV_RETRY_DELAY_MS) {
            self.fetch.retry_delay_ms = ms;
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if self.fetch.max_attempts == 0 {
            tracing::warn!(target: "diagnostics", "max_attempts=0 in config, using 1");
            self.fetch.max_attempts = 1;
        }
        self.expectations = self.expectations.normalized();
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fetch.max_attempts,
            Duration::from_millis(self.fetch.retry_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.fetch.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        self.aggregate.probe_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
