// src/fetch/mod.rs
//! Fetch-with-retry shared by every source probe.

pub mod error;
pub mod retry;
pub mod transport;

pub use error::FetchError;
pub use retry::RetryPolicy;
pub use transport::{FetchRequest, HttpMethod, HttpTransport, Transport};

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde_json::Value;

/// Wraps a [`Transport`] with a [`RetryPolicy`]. Holds no mutable state, so one
/// instance is shared by all probes of a run.
#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl RetryingFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            request_timeout: None,
        }
    }

    /// Per-attempt deadline applied to requests that don't carry their own.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.fetch_json(FetchRequest::get(url)).await
    }

    pub async fn post_json(&self, url: &str, body: Value) -> Result<Value, FetchError> {
        self.fetch_json(FetchRequest::post_json(url, body)).await
    }

    /// Send `request` until it succeeds or the policy gives up; the last error
    /// is returned as-is.
    pub async fn fetch_json(&self, mut request: FetchRequest) -> Result<Value, FetchError> {
        if request.timeout.is_none() {
            request.timeout = self.request_timeout;
        }

        let mut attempt: u32 = 1;
        loop {
            counter!("fetch_attempts_total").increment(1);
            match self.transport.send(&request).await {
                Ok(v) => return Ok(v),
                Err(e) if self.policy.should_retry(attempt, &e) => {
                    tracing::debug!(
                        target: "diagnostics",
                        url = %request.url,
                        attempt,
                        error = %e,
                        "fetch attempt failed, retrying"
                    );
                    counter!("fetch_retries_total").increment(1);
                    tokio::time::sleep(self.policy.delay()).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "diagnostics",
                        url = %request.url,
                        attempts = attempt,
                        error = %e,
                        "fetch gave up"
                    );
                    return Err(e);
                }
            }
        }
    }
}
