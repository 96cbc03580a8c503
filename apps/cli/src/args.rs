use std::path::PathBuf;

use clap::Parser;
use tracker_app::TrackerConfig;
use tracker_core::{BucketWidth, Tier};

use crate::config::CliConfig;

/// Track OpenAI token usage, estimated cost and consumption spikes from a
/// saved Organization Usage report.
#[derive(Parser, Debug, Default)]
#[command(name = "usage-tracker", version, about)]
pub struct CliArgs {
    /// Usage report JSON (one page or an array of pages), re-read every poll
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Config file (defaults to <config dir>/usage-tracker/config.toml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pricing rules JSON used instead of the bundled table
    #[arg(long, value_name = "PATH")]
    pub pricing: Option<PathBuf>,

    /// Write the active pricing table to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub export_pricing: Option<PathBuf>,

    /// How many hours of usage to include
    #[arg(long)]
    pub lookback_hours: Option<u32>,

    /// Bucket size for usage aggregation (1m, 1h or 1d)
    #[arg(long)]
    pub bucket_width: Option<BucketWidth>,

    /// Service tier used for cost estimation (standard, priority, flex, batch)
    #[arg(long)]
    pub tier: Option<Tier>,

    /// Seconds between refreshes (max 600)
    #[arg(short, long)]
    pub interval: Option<f64>,

    /// Token delta per minute that triggers a spike alert
    #[arg(long)]
    pub spike_token_rate: Option<f64>,

    /// Request delta per minute that triggers a spike alert
    #[arg(long)]
    pub spike_request_rate: Option<f64>,

    /// Run a single cycle, print it and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Flags given on the command line win over the config file.
    pub fn apply(&self, file: CliConfig) -> (Option<PathBuf>, Option<PathBuf>, TrackerConfig) {
        let mut tracker = file.tracker;
        if let Some(hours) = self.lookback_hours {
            tracker.lookback_hours = hours;
        }
        if let Some(width) = self.bucket_width {
            tracker.bucket_width = width;
        }
        if let Some(tier) = self.tier {
            tracker.tier = tier;
        }
        if let Some(interval) = self.interval {
            tracker.interval_secs = interval;
        }
        if let Some(rate) = self.spike_token_rate {
            tracker.thresholds.tokens_per_minute = rate;
        }
        if let Some(rate) = self.spike_request_rate {
            tracker.thresholds.requests_per_minute = rate;
        }
        let report = self.report.clone().or(file.report);
        let pricing = self.pricing.clone().or(file.pricing);
        (report, pricing, tracker)
    }
}
