// src/fetch/transport.rs
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::FetchError;
use crate::config::FetchSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One outbound call. `timeout` bounds a single attempt, not the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The network capability the probes depend on: send one request, get JSON back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<Value, FetchError>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &FetchSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .build()
            .context("building reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        let mut rb = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if let Some(body) = &request.body {
            rb = rb.json(body);
        }
        if let Some(timeout) = request.timeout {
            rb = rb.timeout(timeout);
        }

        let resp = rb.send().await.map_err(FetchError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: request.url.clone(),
            });
        }

        let bytes = resp.bytes().await.map_err(FetchError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
    }
}
