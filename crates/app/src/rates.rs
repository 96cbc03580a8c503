use thiserror::Error;
use tracker_core::{RateMap, RateRecord, UsageSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("snapshots are {elapsed_ms} ms apart; elapsed time must be positive")]
    NonPositiveElapsed { elapsed_ms: i64 },
}

/// Returns the delta and whether it had to be clamped.
fn clamped_delta(current: u64, previous: u64) -> (u64, bool) {
    match current.checked_sub(previous) {
        Some(delta) => (delta, false),
        None => (0, true),
    }
}

/// Per-minute deltas between two consecutive snapshots.
///
/// Elapsed time comes from the snapshots' capture timestamps rather than the
/// configured interval. A model missing from `previous` counts from zero;
/// models missing from `current` are not reported.
pub fn compute_rates(
    previous: Option<&UsageSnapshot>,
    current: &UsageSnapshot,
) -> Result<RateMap, RateError> {
    let Some(previous) = previous else {
        return Ok(RateMap::new());
    };

    let elapsed = current.captured_at.signed_duration_since(previous.captured_at);
    let elapsed_seconds = elapsed
        .num_microseconds()
        .map(|micros| micros as f64 / 1_000_000.0)
        .unwrap_or(elapsed.num_seconds() as f64);
    if elapsed_seconds <= 0.0 {
        return Err(RateError::NonPositiveElapsed {
            elapsed_ms: elapsed.num_milliseconds(),
        });
    }
    let elapsed_minutes = elapsed_seconds / 60.0;

    let rates = current
        .models
        .values()
        .map(|model| {
            let prior = previous.get(&model.model);
            let (delta_tokens, tokens_revised) = clamped_delta(
                model.total_tokens(),
                prior.map(|prior| prior.total_tokens()).unwrap_or(0),
            );
            let (delta_requests, requests_revised) = clamped_delta(
                model.requests,
                prior.map(|prior| prior.requests).unwrap_or(0),
            );
            let record = RateRecord {
                model: model.model.clone(),
                elapsed_seconds,
                delta_tokens,
                delta_requests,
                tokens_per_minute: delta_tokens as f64 / elapsed_minutes,
                requests_per_minute: delta_requests as f64 / elapsed_minutes,
                revised: tokens_revised || requests_revised,
            };
            (model.model.clone(), record)
        })
        .collect();
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tracker_core::ModelSnapshot;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    fn snapshot(at: DateTime<Utc>, models: &[(&str, u64, u64, u64)]) -> UsageSnapshot {
        let mut snapshot = UsageSnapshot::new(at);
        for (name, input, output, requests) in models {
            snapshot.models.insert(
                name.to_string(),
                ModelSnapshot {
                    model: name.to_string(),
                    input_tokens: *input,
                    cached_input_tokens: 0,
                    output_tokens: *output,
                    requests: *requests,
                },
            );
        }
        snapshot
    }

    #[test]
    fn cold_start_has_no_rates() {
        let current = snapshot(t0(), &[("gpt-4o", 1_000, 0, 5)]);
        assert!(compute_rates(None, &current).expect("rates").is_empty());
    }

    #[test]
    fn thirty_seconds_of_five_hundred_tokens_is_a_thousand_per_minute() {
        let previous = snapshot(t0(), &[("gpt-4o", 800, 200, 4)]);
        let current = snapshot(t0() + Duration::seconds(30), &[("gpt-4o", 1_100, 400, 7)]);

        let rates = compute_rates(Some(&previous), &current).expect("rates");
        let rate = rates.get("gpt-4o").expect("gpt-4o");
        assert_eq!(rate.delta_tokens, 500);
        assert_eq!(rate.delta_requests, 3);
        assert!((rate.elapsed_seconds - 30.0).abs() < 1e-9);
        assert!((rate.tokens_per_minute - 1_000.0).abs() < 1e-9);
        assert!((rate.requests_per_minute - 6.0).abs() < 1e-9);
        assert!(!rate.revised);
    }

    #[test]
    fn identical_totals_give_zero_rates() {
        let models = [("gpt-4o", 10, 5, 1), ("o3", 100, 50, 2)];
        let previous = snapshot(t0(), &models);
        let current = snapshot(t0() + Duration::seconds(15), &models);

        let rates = compute_rates(Some(&previous), &current).expect("rates");
        assert_eq!(rates.len(), 2);
        for rate in rates.values() {
            assert_eq!(rate.tokens_per_minute, 0.0);
            assert_eq!(rate.requests_per_minute, 0.0);
        }
    }

    #[test]
    fn downward_revision_clamps_to_zero() {
        let previous = snapshot(t0(), &[("gpt-4o", 2_000, 0, 10)]);
        let current = snapshot(t0() + Duration::seconds(60), &[("gpt-4o", 1_500, 0, 12)]);

        let rates = compute_rates(Some(&previous), &current).expect("rates");
        let rate = rates.get("gpt-4o").expect("gpt-4o");
        assert_eq!(rate.delta_tokens, 0);
        assert_eq!(rate.tokens_per_minute, 0.0);
        assert_eq!(rate.delta_requests, 2);
        assert!(rate.revised);
    }

    #[test]
    fn new_model_counts_its_full_total() {
        let previous = snapshot(t0(), &[("gpt-4o", 10, 0, 1)]);
        let current = snapshot(
            t0() + Duration::seconds(60),
            &[("gpt-4o", 10, 0, 1), ("o4-mini", 1_500, 500, 3)],
        );

        let rates = compute_rates(Some(&previous), &current).expect("rates");
        let rate = rates.get("o4-mini").expect("new model");
        assert_eq!(rate.delta_tokens, 2_000);
        assert!((rate.tokens_per_minute - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn dropped_model_has_no_record() {
        let previous = snapshot(t0(), &[("gpt-4o", 10, 0, 1), ("o3", 5, 5, 1)]);
        let current = snapshot(t0() + Duration::seconds(60), &[("gpt-4o", 20, 0, 2)]);

        let rates = compute_rates(Some(&previous), &current).expect("rates");
        assert!(rates.contains_key("gpt-4o"));
        assert!(!rates.contains_key("o3"));
    }

    #[test]
    fn non_positive_elapsed_is_rejected() {
        let previous = snapshot(t0(), &[("gpt-4o", 10, 0, 1)]);
        let same_time = snapshot(t0(), &[("gpt-4o", 20, 0, 1)]);
        assert_eq!(
            compute_rates(Some(&previous), &same_time),
            Err(RateError::NonPositiveElapsed { elapsed_ms: 0 })
        );

        let earlier = snapshot(t0() - Duration::seconds(2), &[("gpt-4o", 20, 0, 1)]);
        assert_eq!(
            compute_rates(Some(&previous), &earlier),
            Err(RateError::NonPositiveElapsed { elapsed_ms: -2_000 })
        );
    }
}
