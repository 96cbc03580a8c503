use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ingest::{UsageQuery, UsageSource, aggregate};
use parking_lot::Mutex;
use serde::Serialize;
use tracker_core::{
    CostReport, PricingTable, RateMap, SpikeAlert, UsageBucket, UsageSnapshot, UsageWindow,
};

use crate::config::TrackerConfig;
use crate::costs::estimate_costs;
use crate::error::Result;
use crate::rates::{RateError, compute_rates};
use crate::spikes::detect_spikes;
use crate::util::time::usage_window;

/// Low-severity conditions worth showing next to a cycle's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Upstream reported lower usage than the previous poll.
    UsageRevised { model: String },
    /// The snapshot was not taken after the previous one; rates were skipped.
    ClockSkew { elapsed_ms: i64 },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::UsageRevised { model } => {
                write!(f, "usage for {} was revised downward; rate clamped to 0", model)
            }
            Notice::ClockSkew { elapsed_ms } => write!(
                f,
                "poll completed {} ms after the previous one; rates skipped",
                elapsed_ms
            ),
        }
    }
}

/// Everything a renderer needs from one poll.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub window: Option<UsageWindow>,
    pub snapshot: UsageSnapshot,
    pub rates: RateMap,
    pub alerts: Vec<SpikeAlert>,
    pub costs: CostReport,
    pub notices: Vec<Notice>,
}

/// A tracking run: its fixed config and pricing, plus the last good snapshot.
pub struct TrackerSession {
    config: Arc<TrackerConfig>,
    pricing: Arc<PricingTable>,
    previous: Mutex<Option<UsageSnapshot>>,
}

impl TrackerSession {
    pub fn new(config: TrackerConfig, pricing: PricingTable) -> Self {
        Self {
            config: Arc::new(config),
            pricing: Arc::new(pricing),
            previous: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn previous_snapshot(&self) -> Option<UsageSnapshot> {
        self.previous.lock().clone()
    }

    /// Runs the pipeline over one poll's buckets.
    ///
    /// A malformed bucket fails the cycle and leaves the previous snapshot in
    /// place. Otherwise the previous snapshot is read and replaced under one
    /// lock, so concurrent callers never pair a snapshot with a stale one.
    pub fn run_cycle(
        &self,
        buckets: &[UsageBucket],
        captured_at: DateTime<Utc>,
    ) -> Result<CycleReport> {
        let snapshot = aggregate(buckets, captured_at)?;
        let mut notices = Vec::new();

        let rates = {
            let mut previous = self.previous.lock();
            let rates = match compute_rates(previous.as_ref(), &snapshot) {
                Ok(rates) => rates,
                Err(RateError::NonPositiveElapsed { elapsed_ms }) => {
                    tracing::warn!(elapsed_ms, "snapshot not newer than previous; skipping rates");
                    notices.push(Notice::ClockSkew { elapsed_ms });
                    RateMap::new()
                }
            };
            *previous = Some(snapshot.clone());
            rates
        };

        for rate in rates.values().filter(|rate| rate.revised) {
            tracing::debug!(model = %rate.model, "usage revised downward");
            notices.push(Notice::UsageRevised {
                model: rate.model.clone(),
            });
        }

        let alerts = detect_spikes(&rates, &self.config.thresholds, captured_at);
        let costs = estimate_costs(&snapshot, self.config.tier, &self.pricing);
        tracing::debug!(
            models = snapshot.models.len(),
            rates = rates.len(),
            alerts = alerts.len(),
            partial_cost = costs.partial,
            "usage cycle complete"
        );

        Ok(CycleReport {
            window: None,
            snapshot,
            rates,
            alerts,
            costs,
            notices,
        })
    }

    /// Fetches the lookback window ending at `now` and runs one cycle.
    ///
    /// The snapshot is stamped when the fetch returns, which is when the poll
    /// actually completed.
    pub fn run_once<S>(&self, source: &mut S, now: DateTime<Utc>) -> Result<CycleReport>
    where
        S: UsageSource + ?Sized,
    {
        let window = usage_window(self.config.lookback_hours, now)?;
        let query = UsageQuery {
            window,
            bucket_width: self.config.bucket_width,
        };
        let buckets = source.fetch(&query)?;
        let mut report = self.run_cycle(&buckets, Utc::now())?;
        report.window = Some(window);
        Ok(report)
    }
}
