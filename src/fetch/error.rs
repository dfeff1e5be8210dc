// src/fetch/error.rs
use thiserror::Error;

/// Failure of a single fetch attempt.
///
/// `Status`, `Timeout` and `Network` are transport failures; `Parse` means the
/// upstream answered 2xx but the body was not valid JSON.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Status { status: u16, url: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Network(String),
    #[error("invalid JSON body: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Parse(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
