use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service tier used to select a price list.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Standard,
    Priority,
    Flex,
    Batch,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Standard, Tier::Priority, Tier::Flex, Tier::Batch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "standard",
            Tier::Priority => "priority",
            Tier::Flex => "flex",
            Tier::Batch => "batch",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| format!("unsupported tier {}", value))
    }
}

/// Width of the buckets requested from the usage report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketWidth {
    #[serde(rename = "1m")]
    Minute,
    #[default]
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
}

impl BucketWidth {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketWidth::Minute => "1m",
            BucketWidth::Hour => "1h",
            BucketWidth::Day => "1d",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            BucketWidth::Minute => 60,
            BucketWidth::Hour => 3_600,
            BucketWidth::Day => 86_400,
        }
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketWidth {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1m" => Ok(BucketWidth::Minute),
            "1h" => Ok(BucketWidth::Hour),
            "1d" => Ok(BucketWidth::Day),
            other => Err(format!("unsupported bucket width {} (expected 1m, 1h or 1d)", other)),
        }
    }
}

/// Span of time queried on each poll, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub start_time: i64,
    pub end_time: i64,
}

/// One time-sliced usage sample for a single model, as reported upstream.
///
/// Counts stay signed so that malformed reports can be rejected by the
/// aggregator instead of being silently wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBucket {
    pub model: String,
    pub start_time: i64,
    pub end_time: i64,
    pub input_tokens: i64,
    pub cached_input_tokens: i64,
    pub output_tokens: i64,
    pub requests: i64,
}

/// Per-model totals over the lookback window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub model: String,
    pub input_tokens: u64,
    /// Subset of `input_tokens` served from the prompt cache.
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub requests: u64,
}

impl ModelSnapshot {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub requests: u64,
    pub total_tokens: u64,
}

/// Per-model totals for one poll, stamped with the time the poll completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub captured_at: DateTime<Utc>,
    pub models: BTreeMap<String, ModelSnapshot>,
}

impl UsageSnapshot {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            models: BTreeMap::new(),
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelSnapshot> {
        self.models.get(model)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn totals(&self) -> UsageTotals {
        self.models
            .values()
            .fold(UsageTotals::default(), |acc, model| UsageTotals {
                input_tokens: acc.input_tokens.saturating_add(model.input_tokens),
                cached_input_tokens: acc
                    .cached_input_tokens
                    .saturating_add(model.cached_input_tokens),
                output_tokens: acc.output_tokens.saturating_add(model.output_tokens),
                requests: acc.requests.saturating_add(model.requests),
                total_tokens: acc.total_tokens.saturating_add(model.total_tokens()),
            })
    }
}

/// Per-minute consumption of one model between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub model: String,
    pub elapsed_seconds: f64,
    pub delta_tokens: u64,
    pub delta_requests: u64,
    pub tokens_per_minute: f64,
    pub requests_per_minute: f64,
    /// Set when upstream revised usage downwards and the delta was clamped to zero.
    pub revised: bool,
}

pub type RateMap = BTreeMap<String, RateRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeKind {
    TokenRate,
    RequestRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeAlert {
    pub model: String,
    pub kind: SpikeKind,
    pub observed_rate: f64,
    pub threshold: f64,
    pub delta: u64,
    pub observed_at: DateTime<Utc>,
}

impl fmt::Display for SpikeAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, unit) = match self.kind {
            SpikeKind::TokenRate => ("Token", "tokens"),
            SpikeKind::RequestRate => ("Request", "requests"),
        };
        write!(
            f,
            "{} spike on {}: {} {} since last check (~{}/min).",
            label,
            self.model,
            format_count(self.delta),
            unit,
            format_count(self.observed_rate.max(0.0).round() as u64)
        )
    }
}

/// One price list entry. Prices are USD per one million tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub tier: Tier,
    pub model_pattern: String,
    pub input_per_1m: f64,
    /// Falls back to `input_per_1m` when the model has no cached discount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_input_per_1m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_per_1m: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    rules: Vec<PricingRule>,
}

impl PricingTable {
    pub fn new(rules: Vec<PricingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PricingRule] {
        &self.rules
    }

    /// Exact model names win over wildcard patterns; among patterns the most
    /// specific (longest) one is used.
    pub fn rate_for(&self, model: &str, tier: Tier) -> Option<&PricingRule> {
        let in_tier = || self.rules.iter().filter(move |rule| rule.tier == tier);
        if let Some(rule) = in_tier().find(|rule| {
            !rule.model_pattern.contains('*') && rule.model_pattern.eq_ignore_ascii_case(model)
        }) {
            return Some(rule);
        }
        in_tier()
            .filter(|rule| {
                rule.model_pattern.contains('*')
                    && model_matches_pattern(model, &rule.model_pattern)
            })
            .max_by_key(|rule| rule.model_pattern.len())
    }
}

pub fn model_matches_pattern(model: &str, pattern: &str) -> bool {
    let model = model.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    let Some((head, rest)) = pattern.split_once('*') else {
        return model == pattern;
    };
    let Some(mut remainder) = model.strip_prefix(head) else {
        return false;
    };
    let mut pieces: Vec<&str> = rest.split('*').collect();
    let tail = pieces.pop().unwrap_or("");
    for piece in pieces.into_iter().filter(|piece| !piece.is_empty()) {
        match remainder.find(piece) {
            Some(index) => remainder = &remainder[index + piece.len()..],
            None => return false,
        }
    }
    remainder.ends_with(tail)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub cached_input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
}

pub fn compute_cost_breakdown(usage: &ModelSnapshot, rule: &PricingRule) -> CostBreakdown {
    // Cached tokens are a subset of input tokens; bill them once at the cached rate.
    let non_cached_input = usage.input_tokens.saturating_sub(usage.cached_input_tokens) as f64;
    let cached_input = usage.cached_input_tokens as f64;
    let output = usage.output_tokens as f64;
    let cached_rate = rule.cached_input_per_1m.unwrap_or(rule.input_per_1m);
    let output_rate = rule.output_per_1m.unwrap_or(0.0);
    let input_cost = (non_cached_input / 1_000_000.0) * rule.input_per_1m;
    let cached_input_cost = (cached_input / 1_000_000.0) * cached_rate;
    let output_cost = (output / 1_000_000.0) * output_rate;
    CostBreakdown {
        input_cost_usd: input_cost,
        cached_input_cost_usd: cached_input_cost,
        output_cost_usd: output_cost,
        total_cost_usd: input_cost + cached_input_cost + output_cost,
    }
}

/// Estimated spend for one model; `breakdown` is `None` when the model has no price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub model: String,
    pub breakdown: Option<CostBreakdown>,
}

impl CostEstimate {
    pub fn is_unknown(&self) -> bool {
        self.breakdown.is_none()
    }

    pub fn total_cost_usd(&self) -> Option<f64> {
        self.breakdown.map(|breakdown| breakdown.total_cost_usd)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub estimates: BTreeMap<String, CostEstimate>,
    /// Sum over priced models only.
    pub total_cost_usd: f64,
    /// True when at least one model is unpriced, making the total a lower bound.
    pub partial: bool,
    pub unpriced_models: Vec<String>,
}

/// Formats a count with comma thousands separators.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
