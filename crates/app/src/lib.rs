pub mod config;
pub mod costs;
pub mod error;
pub mod poller;
pub mod pricing;
pub mod rates;
pub mod session;
pub mod spikes;
pub mod util;

pub use config::{MAX_INTERVAL_SECS, SpikeThresholds, TrackerConfig};
pub use costs::estimate_costs;
pub use error::{AppError, Result};
pub use poller::{PollMessage, Poller};
pub use pricing::{
    load_initial_pricing, load_pricing_table, resolve_pricing_table, write_pricing_table,
};
pub use rates::{RateError, compute_rates};
pub use session::{CycleReport, Notice, TrackerSession};
pub use spikes::detect_spikes;
pub use util::time::{format_unix_utc, usage_window};
