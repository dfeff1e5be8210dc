// tests/support/mod.rs
//
// Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use yield_source_diagnostics::fetch::{
    FetchError, FetchRequest, RetryPolicy, RetryingFetcher, Transport,
};

pub type Reply = Result<Value, FetchError>;

/// Replies per URL are consumed in order; the last one repeats forever.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&request.url) else {
            return Err(FetchError::Network(format!("no route for {}", request.url)));
        };
        if queue.len() > 1 {
            queue.pop_front().expect("non-empty queue")
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Network("empty script".into())))
        }
    }
}

/// Never answers; for deadline tests.
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: &FetchRequest) -> Result<Value, FetchError> {
        std::future::pending().await
    }
}

/// Delays every call, then answers from the wrapped script.
pub struct SlowTransport {
    pub delay: Duration,
    pub inner: ScriptedTransport,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send(request).await
    }
}

/// Panics on every call.
pub struct PanickingTransport;

#[async_trait]
impl Transport for PanickingTransport {
    async fn send(&self, _request: &FetchRequest) -> Result<Value, FetchError> {
        panic!("boom in transport")
    }
}

pub fn status(code: u16) -> Reply {
    Err(FetchError::Status {
        status: code,
        url: String::new(),
    })
}

/// Two attempts, no pause: keeps tests fast without changing retry semantics.
pub fn fetcher(transport: Arc<dyn Transport>) -> RetryingFetcher {
    RetryingFetcher::new(transport, RetryPolicy::new(2, Duration::ZERO))
}

pub const POOLS_URL: &str = "https://pools.test/pools";
pub const GRAPHQL_URL: &str = "https://vaults.test/graphql";
pub const MARKETS_TEMPLATE: &str = "https://markets.test/core/v1/{chain_id}/markets";

pub fn markets_url(chain_id: u64) -> String {
    MARKETS_TEMPLATE.replace("{chain_id}", &chain_id.to_string())
}
