use chrono::{DateTime, SecondsFormat, Utc};
use tracker_app::{CycleReport, format_unix_utc};
use tracker_core::{CostEstimate, Tier, format_count};

const HEADERS: [&str; 7] = [
    "Model",
    "Input",
    "Output",
    "Cached",
    "Requests",
    "Total",
    "Est Cost ($)",
];
const UNKNOWN_COST: &str = "—";

fn cost_cell(estimate: Option<&CostEstimate>) -> String {
    match estimate.and_then(CostEstimate::total_cost_usd) {
        Some(cost) => format!("${:.4}", cost),
        None => UNKNOWN_COST.to_string(),
    }
}

fn render_table(rows: &[[String; 7]], total: &[String; 7]) -> String {
    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in rows.iter().chain(std::iter::once(total)) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String; 7]| {
        cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(index, (cell, width))| {
                if index == 0 {
                    format!("{:<width$}", cell, width = width)
                } else {
                    format!("{:>width$}", cell, width = width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header = HEADERS.map(str::to_string);
    let rule = "-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1));
    let mut out = vec![line(&header), rule.clone()];
    out.extend(rows.iter().map(|row| line(row)));
    out.push(rule);
    out.push(line(total));
    out.join("\n")
}

pub fn render_report(report: &CycleReport, tier: Tier) -> String {
    let mut sections = Vec::new();

    for alert in &report.alerts {
        sections.push(format!("Alert: {}", alert));
    }
    for notice in &report.notices {
        sections.push(format!("Notice: {}", notice));
    }

    let rows: Vec<[String; 7]> = report
        .snapshot
        .models
        .values()
        .map(|model| {
            [
                model.model.clone(),
                format_count(model.input_tokens),
                format_count(model.output_tokens),
                format_count(model.cached_input_tokens),
                format_count(model.requests),
                format_count(model.total_tokens()),
                cost_cell(report.costs.estimates.get(&model.model)),
            ]
        })
        .collect();

    let totals = report.snapshot.totals();
    let mut total_cost = format!("${:.4}", report.costs.total_cost_usd);
    if report.costs.partial {
        total_cost.push_str(" (partial)");
    }
    let total = [
        "TOTAL".to_string(),
        format_count(totals.input_tokens),
        format_count(totals.output_tokens),
        format_count(totals.cached_input_tokens),
        format_count(totals.requests),
        format_count(totals.total_tokens),
        total_cost,
    ];
    sections.push(render_table(&rows, &total));

    let window = report
        .window
        .map(|window| {
            format!(
                "Window (UTC): {} → {}",
                format_unix_utc(window.start_time),
                format_unix_utc(window.end_time)
            )
        })
        .unwrap_or_else(|| "Window (UTC): n/a".to_string());
    sections.push(format!(
        "{} | Tier: {} | Updated: {} | Cached counts are a subset of input tokens.",
        window,
        tier,
        report
            .snapshot
            .captured_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    if report.costs.partial {
        sections.push(format!(
            "No pricing for: {} (excluded from total)",
            report.costs.unpriced_models.join(", ")
        ));
    }

    sections.join("\n")
}

pub fn render_failure(message: &str, at: DateTime<Utc>) -> String {
    format!(
        "Error: cycle failed at {}: {} (keeping previous snapshot)",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        message
    )
}
