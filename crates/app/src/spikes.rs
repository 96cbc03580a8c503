use chrono::{DateTime, Utc};
use tracker_core::{RateMap, SpikeAlert, SpikeKind};

use crate::config::SpikeThresholds;

/// Raises one alert per metric whose rate is at or above its threshold.
///
/// Stateless: a model that stays hot keeps alerting every cycle.
pub fn detect_spikes(
    rates: &RateMap,
    thresholds: &SpikeThresholds,
    observed_at: DateTime<Utc>,
) -> Vec<SpikeAlert> {
    let mut alerts = Vec::new();
    for rate in rates.values() {
        let checks = [
            (
                SpikeKind::TokenRate,
                rate.tokens_per_minute,
                thresholds.tokens_per_minute,
                rate.delta_tokens,
            ),
            (
                SpikeKind::RequestRate,
                rate.requests_per_minute,
                thresholds.requests_per_minute,
                rate.delta_requests,
            ),
        ];
        for (kind, observed_rate, threshold, delta) in checks {
            if observed_rate >= threshold {
                alerts.push(SpikeAlert {
                    model: rate.model.clone(),
                    kind,
                    observed_rate,
                    threshold,
                    delta,
                    observed_at,
                });
            }
        }
    }
    alerts
}
