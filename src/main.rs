//! Yield Source Diagnostics: binary entrypoint
//! Boots the Axum HTTP server with the diagnostics routes and `/metrics`.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use yield_source_diagnostics::{metrics::Metrics, DiagnosticsConfig};

/// Compact logs by default, JSON lines when LOG_FORMAT=json.
/// No-op if the host runtime already installed a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("yield_source_diagnostics=info,diagnostics=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = DiagnosticsConfig::load_default().context("loading diagnostics config")?;
    tracing::info!(
        target: "diagnostics",
        max_attempts = cfg.fetch.max_attempts,
        retry_delay_ms = cfg.fetch.retry_delay_ms,
        healthy_floor = cfg.classify.healthy_floor,
        "diagnostics config loaded"
    );

    let mut router = yield_source_diagnostics::app(&cfg)?;

    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics recorder not installed"),
    }

    Ok(router.into())
}
