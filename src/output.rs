use std::collections::BTreeMap;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};

use crate::types::{SummaryBucket, UsageReport};

fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn format_cost(cost: f64) -> String {
    format!("${:.2}", cost)
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h)));
    table
}

fn print_daily(by_day: &BTreeMap<String, SummaryBucket>) {
    let mut table = new_table(&["Date", "Input", "Output", "Cached", "Cache Write", "Cost"]);

    let mut totals = SummaryBucket::default();
    for (day, bucket) in by_day {
        table.add_row(vec![
            Cell::new(day),
            Cell::new(format_tokens(bucket.input_tokens)),
            Cell::new(format_tokens(bucket.output_tokens)),
            Cell::new(format_tokens(bucket.cached_tokens)),
            Cell::new(format_tokens(bucket.cache_write_tokens)),
            Cell::new(format_cost(bucket.cost)),
        ]);
        totals.accumulate_from(bucket);
    }
    table.add_row(vec![
        Cell::new("TOTAL"),
        Cell::new(format_tokens(totals.input_tokens)),
        Cell::new(format_tokens(totals.output_tokens)),
        Cell::new(format_tokens(totals.cached_tokens)),
        Cell::new(format_tokens(totals.cache_write_tokens)),
        Cell::new(format_cost(totals.cost)),
    ]);

    println!("Daily usage");
    println!("{table}");
}

/// Project, model, and tool tables share a shape: key plus token and cost
/// columns, rows sorted by cost descending.
fn print_breakdown(title: &str, key_header: &str, buckets: &BTreeMap<String, SummaryBucket>) {
    let mut table = new_table(&[key_header, "Input", "Output", "Cost"]);

    let mut rows: Vec<(&String, &SummaryBucket)> = buckets.iter().collect();
    rows.sort_by(|a, b| b.1.cost.total_cmp(&a.1.cost));

    for (key, bucket) in rows {
        table.add_row(vec![
            Cell::new(key),
            Cell::new(format_tokens(bucket.input_tokens)),
            Cell::new(format_tokens(bucket.output_tokens)),
            Cell::new(format_cost(bucket.cost)),
        ]);
    }

    println!("{title}");
    println!("{table}");
}

pub fn print_report(report: &UsageReport) {
    print_daily(&report.by_day);
    println!();
    print_breakdown("Projects", "Project", &report.by_project);
    println!();
    print_breakdown("Models", "Model", &report.by_model);
    println!();
    print_breakdown("Tools", "Tool", &report.by_tool);

    let t = &report.totals;
    println!();
    println!("Overall statistics");
    println!("  Input tokens:   {}", format_tokens(t.input_tokens));
    println!("  Output tokens:  {}", format_tokens(t.output_tokens));
    println!("  Cached tokens:  {}", format_tokens(t.cached_tokens));
    println!("  Total cost:     {}", format_cost(t.cost));
    println!("  Active days:    {}", t.active_days);
    println!("  Avg cost/day:   {}", format_cost(t.avg_cost_per_day));
}

pub fn print_json(report: &UsageReport) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).expect("JSON serialization failed")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_formatting_scales() {
        assert_eq!(format_tokens(950), "950");
        assert_eq!(format_tokens(1_500), "1.5K");
        assert_eq!(format_tokens(2_300_000), "2.3M");
    }

    #[test]
    fn cost_formatting_two_decimals() {
        assert_eq!(format_cost(0.0), "$0.00");
        assert_eq!(format_cost(7.639), "$7.64");
    }
}
