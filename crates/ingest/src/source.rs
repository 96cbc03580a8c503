use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracker_core::{BucketWidth, UsageBucket, UsageWindow};

use crate::parser::usage_buckets_from_reader;
use crate::totals::validated_usage;
use crate::types::{IngestError, Result};

/// What one poll asks the usage report for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageQuery {
    pub window: UsageWindow,
    pub bucket_width: BucketWidth,
}

impl UsageQuery {
    pub fn overlaps(&self, bucket: &UsageBucket) -> bool {
        bucket.end_time > self.window.start_time && bucket.start_time < self.window.end_time
    }

    /// Rejects malformed buckets and buckets of another width, wherever
    /// they fall relative to the window.
    pub fn check(&self, bucket: &UsageBucket) -> Result<()> {
        validated_usage(bucket)?;
        let span_secs = bucket.end_time.saturating_sub(bucket.start_time);
        if span_secs != self.bucket_width.seconds() {
            return Err(IngestError::BucketWidth {
                model: bucket.model.clone(),
                start_time: bucket.start_time,
                span_secs,
                expected: self.bucket_width,
            });
        }
        Ok(())
    }
}

/// Supplies the raw buckets for one poll.
pub trait UsageSource {
    fn fetch(&mut self, query: &UsageQuery) -> Result<Vec<UsageBucket>>;
}

/// Re-reads a saved usage report (one page or an array of pages) on every poll.
#[derive(Debug, Clone)]
pub struct ReportFileSource {
    path: PathBuf,
}

impl ReportFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsageSource for ReportFileSource {
    fn fetch(&mut self, query: &UsageQuery) -> Result<Vec<UsageBucket>> {
        let file = File::open(&self.path)?;
        let buckets = usage_buckets_from_reader(BufReader::new(file))?;
        let read = buckets.len();
        for bucket in &buckets {
            query.check(bucket)?;
        }
        let buckets: Vec<_> = buckets
            .into_iter()
            .filter(|bucket| query.overlaps(bucket))
            .collect();
        tracing::debug!(
            path = %self.path.display(),
            read,
            kept = buckets.len(),
            "loaded usage report"
        );
        Ok(buckets)
    }
}
