use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{AppError, Result};
use tracker_core::UsageWindow;

const SECONDS_PER_HOUR: i64 = 3_600;

/// Lookback window ending at `now`, in whole unix seconds.
pub fn usage_window(lookback_hours: u32, now: DateTime<Utc>) -> Result<UsageWindow> {
    if lookback_hours < 1 {
        return Err(AppError::InvalidInput(
            "lookback-hours must be at least 1".to_string(),
        ));
    }
    let end_time = now.timestamp();
    let start_time = end_time - i64::from(lookback_hours) * SECONDS_PER_HOUR;
    Ok(UsageWindow {
        start_time,
        end_time,
    })
}

pub fn format_unix_utc(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|value| value.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}
