use tracker_core::{
    CostEstimate, CostReport, PricingTable, Tier, UsageSnapshot, compute_cost_breakdown,
};

/// Prices every model in the snapshot for `tier`.
///
/// Models without a pricing entry are reported as unknown and left out of the
/// total, which is then flagged as partial.
pub fn estimate_costs(snapshot: &UsageSnapshot, tier: Tier, table: &PricingTable) -> CostReport {
    let mut report = CostReport::default();
    for model in snapshot.models.values() {
        let breakdown = table
            .rate_for(&model.model, tier)
            .map(|rule| compute_cost_breakdown(model, rule));
        match breakdown {
            Some(breakdown) => report.total_cost_usd += breakdown.total_cost_usd,
            None => report.unpriced_models.push(model.model.clone()),
        }
        report.estimates.insert(
            model.model.clone(),
            CostEstimate {
                model: model.model.clone(),
                breakdown,
            },
        );
    }
    report.partial = !report.unpriced_models.is_empty();
    report
}
