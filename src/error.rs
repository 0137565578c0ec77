use itertools::Itertools;
use thiserror::Error;

use crate::metric::MetricKey;
use crate::timer::Phase;

/// Rejection of a single raw entry (metric value or recovery time field)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no value entered")]
    Empty,
    #[error("not a number")]
    NotANumber,
    #[error("value must be between {min} and {max}")]
    OutOfRange { min: f64, max: f64 },
}

/// Errors returned by session commands. None of them leave state half-applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("the test has not been started")]
    NotStarted,
    #[error("{elapsed_secs}s is outside every recording window")]
    OutOfWindow { elapsed_secs: u64 },
    #[error("missing current values for {}", join_keys(.0))]
    MissingMetrics(Vec<MetricKey>),
    #[error("missing baseline values for {}", join_keys(.0))]
    MissingBaseline(Vec<MetricKey>),
    #[error("already running")]
    AlreadyRunning,
    #[error("the recovery stopwatch is not running")]
    NotRunning,
    #[error("the test is already completed; reset to run again")]
    AlreadyCompleted,
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: Phase, action: &'static str },
}

/// Invalid protocol configuration (metric descriptors, minute windows)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{key}: min {min} must be below max {max}")]
    InvalidBounds { key: MetricKey, min: f64, max: f64 },
    #[error("{key}: decimals must be 0 or 1, got {decimals}")]
    InvalidDecimals { key: MetricKey, decimals: u8 },
    #[error("{key} is described more than once")]
    DuplicateMetric { key: MetricKey },
    #[error("minute {minute}: window start {start}s is after end {end}s")]
    InvalidWindow { minute: u8, start: u64, end: u64 },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_keys(keys: &[MetricKey]) -> String {
    keys.iter().map(|k| k.label()).join(", ")
}
