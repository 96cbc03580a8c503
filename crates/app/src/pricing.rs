use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{AppError, Result};
use tracker_core::{PricingRule, PricingTable};

fn validate_rules(rules: Vec<PricingRule>) -> Result<PricingTable> {
    for rule in &rules {
        if rule.model_pattern.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "pricing rule for tier {} has an empty model pattern",
                rule.tier
            )));
        }
        let prices = [
            Some(rule.input_per_1m),
            rule.cached_input_per_1m,
            rule.output_per_1m,
        ];
        if prices
            .into_iter()
            .flatten()
            .any(|price| !price.is_finite() || price < 0.0)
        {
            return Err(AppError::InvalidInput(format!(
                "pricing rule {} ({}) has an invalid price",
                rule.model_pattern, rule.tier
            )));
        }
    }
    Ok(PricingTable::new(rules))
}

/// Loads a JSON list of pricing rules (USD per 1M tokens).
pub fn load_pricing_table(path: &Path) -> Result<PricingTable> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let rules: Vec<PricingRule> = serde_json::from_reader(reader)?;
    validate_rules(rules)
}

pub fn load_initial_pricing() -> Result<PricingTable> {
    let data = include_str!("../pricing-table.json");
    let rules: Vec<PricingRule> = serde_json::from_str(data)?;
    validate_rules(rules)
}

/// Uses the table at `path` when given, otherwise the bundled defaults.
pub fn resolve_pricing_table(path: Option<&Path>) -> Result<PricingTable> {
    let table = match path {
        Some(path) => load_pricing_table(path).map_err(|err| {
            AppError::Message(format!("load pricing {}: {}", path.display(), err))
        })?,
        None => load_initial_pricing()?,
    };
    tracing::debug!(rules = table.rules().len(), "pricing table loaded");
    Ok(table)
}

pub fn write_pricing_table(path: &Path, table: &PricingTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, table.rules()).map_err(AppError::from)
}
