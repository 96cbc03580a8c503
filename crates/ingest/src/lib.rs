mod parser;
mod source;
mod totals;
mod types;

pub use parser::{
    UsagePage, parse_usage_page, usage_buckets_from_reader, usage_buckets_from_str,
    usage_pages_from_value,
};
pub use source::{ReportFileSource, UsageQuery, UsageSource};
pub use totals::aggregate;
pub use types::{AggregationError, IngestError, Result};
