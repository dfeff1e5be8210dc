// src/probe/types.rs
use serde::{Serialize, Serializer};

/// Outcome of probing one source. Serialized as
/// `{"status":"success","count":..}` or `{"status":"error","error":".."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeResult {
    Success(ProbeSuccess),
    #[serde(rename = "error")]
    Failure {
        #[serde(rename = "error")]
        message: String,
    },
}

impl ProbeResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Qualifying count; `None` for failures.
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Success(s) => Some(s.count),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { message } => Some(message),
        }
    }

    pub fn success(&self) -> Option<&ProbeSuccess> {
        match self {
            Self::Success(s) => Some(s),
            Self::Failure { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeSuccess {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(rename = "byChain", skip_serializing_if = "Option::is_none")]
    pub by_partition: Option<PartitionCounts>,
}

impl ProbeSuccess {
    pub fn new(count: u64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_sample(mut self, sample: Option<String>) -> Self {
        self.sample = sample;
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_partitions(mut self, partitions: PartitionCounts) -> Self {
        self.by_partition = Some(partitions);
        self
    }
}

/// Per-partition outcome. A failed partition keeps its message and is left
/// out of the source total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionCount {
    Count(u64),
    Error(String),
}

impl PartitionCount {
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Error(_) => None,
        }
    }
}

impl Serialize for PartitionCount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => s.serialize_u64(*n),
            Self::Error(msg) => s.collect_str(&format_args!("error: {msg}")),
        }
    }
}

/// Partition name → outcome, in the order partitions were configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionCounts(Vec<(String, PartitionCount)>);

impl PartitionCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: PartitionCount) {
        self.0.push((name.into(), outcome));
    }

    pub fn get(&self, name: &str) -> Option<&PartitionCount> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PartitionCount)> {
        self.0.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum over partitions that succeeded.
    pub fn total(&self) -> u64 {
        self.0.iter().filter_map(|(_, c)| c.as_count()).sum()
    }
}

impl Serialize for PartitionCounts {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(self.0.iter().map(|(n, c)| (n, c)))
    }
}
