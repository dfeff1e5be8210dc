// tests/probes.rs
//
// Filter semantics and metadata of each source probe, driven through the
// public `Probe` trait with a scripted transport.

mod support;

use std::sync::Arc;

use serde_json::json;
use support::{fetcher, markets_url, status, ScriptedTransport, GRAPHQL_URL, MARKETS_TEMPLATE, POOLS_URL};
use yield_source_diagnostics::fetch::HttpMethod;
use yield_source_diagnostics::probe::{
    MarketProbe, Partition, PartitionCount, PoolProbe, Probe, ProbeResult, ProjectPoolProbe,
    StaticProbe, VaultProbe,
};

fn pools_transport(data: serde_json::Value) -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new().on(POOLS_URL, vec![Ok(json!({ "data": data }))]))
}

#[tokio::test]
async fn pool_filter_keeps_only_liquid_sane_stablecoins() {
    let transport = pools_transport(json!([
        { "project": "aave-v3", "stablecoin": true,  "tvlUsd": 200000, "apy": 5 },
        { "project": "lido",    "stablecoin": false, "tvlUsd": 200000, "apy": 5 },
        { "project": "tiny",    "stablecoin": true,  "tvlUsd": 50000,  "apy": 5 },
        { "project": "degen",   "stablecoin": true,  "tvlUsd": 200000, "apy": 250 }
    ]));
    let result = PoolProbe::new(POOLS_URL).probe(&fetcher(transport)).await;

    let s = result.success().expect("pool probe succeeds");
    assert_eq!(s.count, 1);
    assert_eq!(s.sample.as_deref(), Some("aave-v3"));
}

#[tokio::test]
async fn pool_count_is_capped_and_sample_comes_from_raw_feed() {
    let mut items = vec![json!({ "project": "first-raw", "stablecoin": false })];
    items.extend((0..80).map(|i| {
        json!({ "project": format!("p{i}"), "stablecoin": true, "tvlUsd": 1.0e6, "apy": 3.5 })
    }));
    let transport = pools_transport(json!(items));

    let result = PoolProbe::new(POOLS_URL).probe(&fetcher(transport)).await;
    assert_eq!(result.count(), Some(50));
    assert_eq!(
        result.success().and_then(|s| s.sample.as_deref()),
        Some("first-raw")
    );
}

#[tokio::test]
async fn pool_probe_fails_when_feed_has_no_data_array() {
    let transport = Arc::new(ScriptedTransport::new().on(POOLS_URL, vec![Ok(json!({ "status": "ok" }))]));
    let result = PoolProbe::new(POOLS_URL).probe(&fetcher(transport)).await;
    let msg = result.error().expect("missing data is a failure");
    assert!(msg.starts_with("unexpected payload"), "{msg}");
}

#[tokio::test]
async fn pool_probe_surfaces_last_transport_error() {
    let transport = Arc::new(ScriptedTransport::new().on(POOLS_URL, vec![status(429), status(503)]));
    let result = PoolProbe::new(POOLS_URL).probe(&fetcher(transport.clone())).await;
    assert_eq!(result, ProbeResult::failure("HTTP 503"));
    assert_eq!(transport.calls_to(POOLS_URL), 2);
}

#[tokio::test]
async fn project_pools_require_alias_bounds_and_stable_symbol() {
    let transport = pools_transport(json!([
        { "project": "euler-v2", "symbol": "USDC",      "tvlUsd": 300000, "apy": 6 },
        { "project": "euler",    "symbol": "esusds-1",  "tvlUsd": 300000, "apy": 6 },
        { "project": "euler-v2", "symbol": "WETH",      "tvlUsd": 300000, "apy": 6 },
        { "project": "euler-v2", "symbol": "USDT",      "tvlUsd": 90000,  "apy": 6 },
        { "project": "euler-v2", "symbol": "PYUSD",     "tvlUsd": 300000, "apy": 260 },
        { "project": "morpho",   "symbol": "USDC",      "tvlUsd": 300000, "apy": 6 }
    ]));
    let result = ProjectPoolProbe::euler(POOLS_URL)
        .probe(&fetcher(transport))
        .await;

    let s = result.success().unwrap();
    assert_eq!(s.count, 2);
    assert_eq!(s.total, Some(3));
}

#[tokio::test]
async fn vault_probe_posts_graphql_and_counts_large_vaults() {
    let transport = Arc::new(ScriptedTransport::new().on(
        GRAPHQL_URL,
        vec![Ok(json!({
            "data": { "vaultV2s": { "items": [
                { "name": "Steakhouse USDC", "totalAssetsUsd": 5.0e7 },
                { "name": "Small",           "totalAssetsUsd": 1.0e4 },
                { "name": "Edge",            "totalAssetsUsd": 100000 },
                { "name": "No TVL" }
            ] } }
        }))],
    ));
    let result = VaultProbe::new(GRAPHQL_URL)
        .probe(&fetcher(transport.clone()))
        .await;

    let s = result.success().unwrap();
    assert_eq!(s.count, 1);
    assert_eq!(s.total, Some(4));
    assert_eq!(s.sample.as_deref(), Some("Steakhouse USDC"));

    let req = &transport.requests()[0];
    assert_eq!(req.method, HttpMethod::Post);
    let query = req.body.as_ref().and_then(|b| b["query"].as_str()).unwrap();
    assert!(query.contains("vaultV2s(first: 100"));
}

#[tokio::test]
async fn vault_probe_reports_graphql_errors_as_failure() {
    let transport = Arc::new(ScriptedTransport::new().on(
        GRAPHQL_URL,
        vec![Ok(json!({ "errors": [{ "message": "rate limited" }] }))],
    ));
    let result = VaultProbe::new(GRAPHQL_URL).probe(&fetcher(transport)).await;
    assert_eq!(result, ProbeResult::failure("GraphQL error: rate limited"));
}

fn markets_page() -> serde_json::Value {
    json!({ "results": [
        { "underlyingAsset": { "symbol": "sUSDe" }, "totalActiveLiquidity": 2.5e6 },
        { "underlyingAsset": { "symbol": "" }, "pt": { "symbol": "PT-sDAI" }, "totalActiveLiquidity": 50000 },
        { "underlyingAsset": { "symbol": "USDC" }, "totalActiveLiquidity": 5000 },
        { "underlyingAsset": { "symbol": "wstETH" }, "totalActiveLiquidity": 9.0e7 }
    ] })
}

#[tokio::test]
async fn market_partition_failure_is_isolated() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&markets_url(1), vec![status(500)])
            .on(&markets_url(42161), vec![Ok(markets_page())]),
    );
    let probe = MarketProbe::new(MARKETS_TEMPLATE).with_partitions(vec![
        Partition::new(1, "Ethereum"),
        Partition::new(42161, "Arbitrum"),
    ]);

    let result = probe.probe(&fetcher(transport.clone())).await;
    let s = result.success().expect("partition failure must not fail the source");

    assert_eq!(s.count, 2);
    let parts = s.by_partition.as_ref().unwrap();
    assert_eq!(parts.get("Ethereum"), Some(&PartitionCount::Error("HTTP 500".into())));
    assert_eq!(parts.get("Arbitrum"), Some(&PartitionCount::Count(2)));
    // each partition call is retried on its own
    assert_eq!(transport.calls_to(&markets_url(1)), 2);
    assert_eq!(transport.calls_to(&markets_url(42161)), 1);

    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["byChain"]["Ethereum"], json!("error: HTTP 500"));
    assert_eq!(v["byChain"]["Arbitrum"], json!(2));
}

#[tokio::test]
async fn market_probe_sums_all_default_partitions() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&markets_url(1), vec![Ok(markets_page())])
            .on(&markets_url(42161), vec![Ok(json!({ "results": [] }))])
            .on(&markets_url(10), vec![Ok(json!({}))]),
    );
    let result = MarketProbe::new(MARKETS_TEMPLATE)
        .probe(&fetcher(transport))
        .await;

    let s = result.success().unwrap();
    assert_eq!(s.count, 2);
    let names: Vec<_> = s.by_partition.as_ref().unwrap().iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["Ethereum", "Arbitrum", "Optimism"]);
}

#[tokio::test]
async fn static_probe_needs_no_network() {
    let transport = Arc::new(ScriptedTransport::new());
    let result = StaticProbe::default().probe(&fetcher(transport.clone())).await;
    assert_eq!(result.count(), Some(14));
    assert_eq!(transport.total_calls(), 0);
}
