use std::io;

use thiserror::Error;
use tracker_core::BucketWidth;

/// A bucket that cannot be folded into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("bucket for {model} has end {end_time} not after start {start_time}")]
    InvalidTimeRange {
        model: String,
        start_time: i64,
        end_time: i64,
    },
    #[error("bucket for {model} has negative {field}: {value}")]
    NegativeCount {
        model: String,
        field: &'static str,
        value: i64,
    },
}

/// Errors emitted while reading or reducing a usage report.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid usage report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),
    #[error("bucket for {model} at {start_time} spans {span_secs}s, expected {expected} buckets")]
    BucketWidth {
        model: String,
        start_time: i64,
        span_secs: i64,
        expected: BucketWidth,
    },
}

pub type Result<T> = std::result::Result<T, IngestError>;
