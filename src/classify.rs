// src/classify.rs
//! Compares each source's count with its expected range and turns the report
//! into an ordered list of recommendations.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregate::AggregateReport;
use crate::probe::ProbeResult;

/// Below this many yields overall the service is considered degraded.
pub const DEFAULT_HEALTHY_FLOOR: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub min: u64,
    pub max: u64,
}

impl Expectation {
    pub fn new(min: u64, max: u64) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn verdict(&self, actual: u64) -> Verdict {
        if actual < self.min {
            Verdict::TooLow
        } else if actual > self.max {
            Verdict::TooHigh
        } else {
            Verdict::InRange
        }
    }
}

/// Expected count range per source name. Immutable once built; substitute a
/// different table to change the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectationTable(BTreeMap<String, Expectation>);

impl Default for ExpectationTable {
    fn default() -> Self {
        Self::reference()
    }
}

impl ExpectationTable {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Ranges observed for the five reference sources.
    pub fn reference() -> Self {
        Self::empty()
            .with("defiLlama", Expectation::new(40, 50))
            .with("morpho", Expectation::new(25, 35))
            .with("euler", Expectation::new(20, 30))
            .with("pendle", Expectation::new(10, 30))
            .with("manual", Expectation::new(24, 24))
    }

    pub fn with(mut self, source: impl Into<String>, expectation: Expectation) -> Self {
        self.0.insert(source.into(), expectation);
        self
    }

    pub fn get(&self, source: &str) -> Option<&Expectation> {
        self.0.get(source)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn normalized(self) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(k, e)| (k, Expectation::new(e.min, e.max)))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    InRange,
    TooLow,
    TooHigh,
    NoExpectation,
}

/// One "expected vs actual" row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub source: String,
    pub expected: Option<Expectation>,
    /// Failed sources compare as 0.
    pub actual: u64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendation {
    Timeout { source: String },
    SourceError { source: String, message: String },
    LowCount {
        source: String,
        count: u64,
        expected: Expectation,
    },
    LowTotal { total: u64, floor: u64 },
    AllHealthy,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { source } => write!(
                f,
                "{source}: Timing out. Consider raising the execution time limit of the diagnostics host."
            ),
            Self::SourceError { source, message } => write!(
                f,
                "{source}: Error - {message}. Check the service logs for details."
            ),
            Self::LowCount {
                source,
                count,
                expected,
            } => write!(
                f,
                "{source}: Low count ({count} vs expected {}-{}). Filters may be too strict.",
                expected.min, expected.max
            ),
            Self::LowTotal { total, floor } => write!(
                f,
                "Overall: Total yields ({total}) below {floor}. Check failed sources and the execution time limit."
            ),
            Self::AllHealthy => {
                write!(f, "Everything looks good! All sources are working as expected.")
            }
        }
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// True when an error message reads like a deadline was hit.
pub fn is_timeout_message(message: &str) -> bool {
    message.contains("timeout") || message.contains("timed out")
}

#[derive(Debug, Clone)]
pub struct Classifier {
    expectations: ExpectationTable,
    healthy_floor: u64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ExpectationTable::reference(), DEFAULT_HEALTHY_FLOOR)
    }
}

impl Classifier {
    pub fn new(expectations: ExpectationTable, healthy_floor: u64) -> Self {
        Self {
            expectations,
            healthy_floor,
        }
    }

    /// Per-source verdicts in report order. `TooHigh` only shows up here; it
    /// never produces a recommendation.
    pub fn compare(&self, report: &AggregateReport) -> Vec<Comparison> {
        report
            .results
            .iter()
            .map(|(source, result)| {
                let actual = result.count().unwrap_or(0);
                let expected = self.expectations.get(source).copied();
                let verdict = expected.map_or(Verdict::NoExpectation, |e| e.verdict(actual));
                Comparison {
                    source: source.to_string(),
                    expected,
                    actual,
                    verdict,
                }
            })
            .collect()
    }

    /// Failures first, then low counts, then the overall floor; a lone
    /// `AllHealthy` when none of those fire. Never empty.
    pub fn classify(&self, report: &AggregateReport) -> Vec<Recommendation> {
        let mut recs = Vec::new();

        for (source, result) in report.results.iter() {
            if let ProbeResult::Failure { message } = result {
                if is_timeout_message(message) {
                    recs.push(Recommendation::Timeout {
                        source: source.to_string(),
                    });
                } else {
                    recs.push(Recommendation::SourceError {
                        source: source.to_string(),
                        message: message.clone(),
                    });
                }
            }
        }

        for (source, result) in report.results.iter() {
            let (Some(count), Some(expected)) = (result.count(), self.expectations.get(source))
            else {
                continue;
            };
            if count < expected.min {
                recs.push(Recommendation::LowCount {
                    source: source.to_string(),
                    count,
                    expected: *expected,
                });
            }
        }

        if report.summary.total_yields < self.healthy_floor {
            recs.push(Recommendation::LowTotal {
                total: report.summary.total_yields,
                floor: self.healthy_floor,
            });
        }

        if recs.is_empty() {
            recs.push(Recommendation::AllHealthy);
        }
        recs
    }
}
