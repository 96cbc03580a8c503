use chrono::{DateTime, Utc};
use tracker_core::{ModelSnapshot, UsageBucket, UsageSnapshot};

use crate::types::AggregationError;

fn count(bucket: &UsageBucket, field: &'static str, value: i64) -> Result<u64, AggregationError> {
    u64::try_from(value).map_err(|_| AggregationError::NegativeCount {
        model: bucket.model.clone(),
        field,
        value,
    })
}

pub(crate) fn validated_usage(bucket: &UsageBucket) -> Result<ModelSnapshot, AggregationError> {
    if bucket.end_time <= bucket.start_time {
        return Err(AggregationError::InvalidTimeRange {
            model: bucket.model.clone(),
            start_time: bucket.start_time,
            end_time: bucket.end_time,
        });
    }
    Ok(ModelSnapshot {
        model: bucket.model.clone(),
        input_tokens: count(bucket, "input_tokens", bucket.input_tokens)?,
        cached_input_tokens: count(bucket, "cached_input_tokens", bucket.cached_input_tokens)?,
        output_tokens: count(bucket, "output_tokens", bucket.output_tokens)?,
        requests: count(bucket, "requests", bucket.requests)?,
    })
}

fn add_usage(total: &mut ModelSnapshot, usage: &ModelSnapshot) {
    total.input_tokens = total.input_tokens.saturating_add(usage.input_tokens);
    total.cached_input_tokens = total
        .cached_input_tokens
        .saturating_add(usage.cached_input_tokens);
    total.output_tokens = total.output_tokens.saturating_add(usage.output_tokens);
    total.requests = total.requests.saturating_add(usage.requests);
}

/// Folds one poll's buckets into per-model totals.
///
/// Every bucket is validated before anything is summed, so a malformed
/// report never yields a partially built snapshot.
pub fn aggregate<'a, I>(
    buckets: I,
    captured_at: DateTime<Utc>,
) -> Result<UsageSnapshot, AggregationError>
where
    I: IntoIterator<Item = &'a UsageBucket>,
{
    let usages = buckets
        .into_iter()
        .map(validated_usage)
        .collect::<Result<Vec<_>, _>>()?;

    let mut snapshot = UsageSnapshot::new(captured_at);
    for usage in &usages {
        let total = snapshot
            .models
            .entry(usage.model.clone())
            .or_insert_with(|| ModelSnapshot::new(usage.model.clone()));
        add_usage(total, usage);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn bucket(
        model: &str,
        start: i64,
        input: i64,
        output: i64,
        cached: i64,
        requests: i64,
    ) -> UsageBucket {
        UsageBucket {
            model: model.to_string(),
            start_time: start,
            end_time: start + 3_600,
            input_tokens: input,
            cached_input_tokens: cached,
            output_tokens: output,
            requests,
        }
    }

    #[test]
    fn single_bucket_aggregates_to_its_counts() {
        let buckets = vec![bucket("gpt-4o", 0, 1000, 500, 0, 10)];
        let snapshot = aggregate(&buckets, at()).expect("snapshot");

        assert_eq!(snapshot.captured_at, at());
        assert_eq!(snapshot.models.len(), 1);
        let model = snapshot.get("gpt-4o").expect("model");
        assert_eq!(model.input_tokens, 1000);
        assert_eq!(model.output_tokens, 500);
        assert_eq!(model.cached_input_tokens, 0);
        assert_eq!(model.requests, 10);
        assert_eq!(model.total_tokens(), 1500);
    }

    #[test]
    fn groups_by_model_and_ignores_order() {
        let buckets = vec![
            bucket("gpt-4o", 0, 100, 10, 5, 1),
            bucket("o3", 0, 7, 3, 0, 1),
            bucket("gpt-4o", 3_600, 200, 20, 0, 2),
            bucket("o3", 7_200, 0, 0, 0, 0),
        ];
        let forward = aggregate(&buckets, at()).expect("forward");
        let reversed = aggregate(buckets.iter().rev(), at()).expect("reversed");
        let mut rotated = buckets.clone();
        rotated.rotate_left(1);
        let rotated = aggregate(&rotated, at()).expect("rotated");

        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
        let gpt = forward.get("gpt-4o").expect("gpt-4o");
        assert_eq!(gpt.input_tokens, 300);
        assert_eq!(gpt.cached_input_tokens, 5);
        assert_eq!(gpt.requests, 3);
        assert_eq!(forward.get("o3").expect("o3").total_tokens(), 10);
    }

    #[test]
    fn splitting_a_bucket_keeps_totals() {
        let whole = vec![bucket("gpt-4.1", 0, 900, 300, 120, 9)];
        let mut first = bucket("gpt-4.1", 0, 400, 100, 20, 4);
        first.end_time = 1_800;
        let mut second = bucket("gpt-4.1", 1_800, 500, 200, 100, 5);
        second.end_time = 3_600;
        let split = vec![first, second];

        assert_eq!(
            aggregate(&whole, at()).expect("whole"),
            aggregate(&split, at()).expect("split")
        );
    }

    #[test]
    fn zero_count_buckets_keep_model_without_usage() {
        let buckets = vec![bucket("gpt-5-nano", 0, 0, 0, 0, 0)];
        let snapshot = aggregate(&buckets, at()).expect("snapshot");
        let model = snapshot.get("gpt-5-nano").expect("model present");
        assert_eq!(model.total_tokens(), 0);
        assert_eq!(model.requests, 0);
    }

    #[test]
    fn empty_input_yields_empty_snapshot() {
        let snapshot = aggregate(&Vec::<UsageBucket>::new(), at()).expect("snapshot");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn rejects_inverted_or_empty_time_range() {
        let mut bad = bucket("gpt-4o", 100, 1, 1, 0, 1);
        bad.end_time = 100;
        let buckets = vec![bucket("gpt-4o", 0, 1, 1, 0, 1), bad];
        let err = aggregate(&buckets, at()).expect_err("invalid range");
        assert_eq!(
            err,
            AggregationError::InvalidTimeRange {
                model: "gpt-4o".to_string(),
                start_time: 100,
                end_time: 100,
            }
        );
    }

    #[test]
    fn rejects_negative_counts() {
        let buckets = vec![bucket("o4-mini", 0, 10, 5, 0, -1)];
        let err = aggregate(&buckets, at()).expect_err("negative requests");
        assert_eq!(
            err,
            AggregationError::NegativeCount {
                model: "o4-mini".to_string(),
                field: "requests",
                value: -1,
            }
        );
    }
}
