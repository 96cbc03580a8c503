use std::io::Read;

use serde::Deserialize;
use serde_json::Value;
use tracker_core::UsageBucket;

use crate::types::Result;

const UNKNOWN_MODEL: &str = "unknown";

/// One page of the completions usage report, grouped by model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsagePage {
    #[serde(default, alias = "results")]
    data: Vec<RawBucket>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBucket {
    start_time: i64,
    end_time: i64,
    #[serde(default, alias = "result")]
    results: Vec<RawResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawResult {
    #[serde(default)]
    model: Option<String>,
    #[serde(default, alias = "n_input_tokens")]
    input_tokens: i64,
    #[serde(default, alias = "n_output_tokens")]
    output_tokens: i64,
    #[serde(
        default,
        alias = "cached_input_tokens",
        alias = "n_cached_input_tokens"
    )]
    input_cached_tokens: i64,
    #[serde(default, alias = "n_requests", alias = "n_model_requests")]
    num_model_requests: i64,
}

impl UsagePage {
    /// Cursor for the following page, if the report continues.
    pub fn next_page(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.next_page.as_deref().filter(|value| !value.is_empty())
    }

    pub fn bucket_count(&self) -> usize {
        self.data.iter().map(|bucket| bucket.results.len()).sum()
    }

    pub fn into_buckets(self) -> Vec<UsageBucket> {
        self.data
            .into_iter()
            .flat_map(|bucket| {
                let (start_time, end_time) = (bucket.start_time, bucket.end_time);
                bucket
                    .results
                    .into_iter()
                    .map(move |result| result.into_bucket(start_time, end_time))
            })
            .collect()
    }
}

impl RawResult {
    fn into_bucket(self, start_time: i64, end_time: i64) -> UsageBucket {
        let model = self
            .model
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
        UsageBucket {
            model,
            start_time,
            end_time,
            input_tokens: self.input_tokens,
            cached_input_tokens: self.input_cached_tokens,
            output_tokens: self.output_tokens,
            requests: self.num_model_requests,
        }
    }
}

pub fn parse_usage_page(input: &str) -> Result<UsagePage> {
    Ok(serde_json::from_str(input)?)
}

/// Accepts either a single report page or an array of pages.
pub fn usage_pages_from_value(value: Value) -> Result<Vec<UsagePage>> {
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

pub fn usage_buckets_from_reader<R: Read>(reader: R) -> Result<Vec<UsageBucket>> {
    let value: Value = serde_json::from_reader(reader)?;
    let pages = usage_pages_from_value(value)?;
    if let Some(cursor) = pages.last().and_then(UsagePage::next_page) {
        tracing::warn!(next_page = cursor, "usage report stops before its last page");
    }
    tracing::debug!(
        pages = pages.len(),
        results = pages.iter().map(UsagePage::bucket_count).sum::<usize>(),
        "parsed usage report"
    );
    Ok(pages.into_iter().flat_map(UsagePage::into_buckets).collect())
}

pub fn usage_buckets_from_str(input: &str) -> Result<Vec<UsageBucket>> {
    usage_buckets_from_reader(input.as_bytes())
}
