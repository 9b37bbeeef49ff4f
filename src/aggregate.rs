use std::collections::BTreeMap;

use crate::cost::cost_for;
use crate::pricing::normalize_model;
use crate::project::resolve_project;
use crate::types::{SummaryBucket, Totals, UsageEvent, UsageReport};

/// Fold events into the four summary tables plus grand totals.
///
/// Each event lands in all four tables, keyed by calendar date, resolved
/// project name, normalized model id and source tool. The fold is commutative
/// and associative, so the result is independent of event order.
pub fn aggregate(events: &[UsageEvent]) -> UsageReport {
    let mut report = UsageReport::default();

    for event in events {
        let cost = event_cost(event);
        let day = event.timestamp.format("%Y-%m-%d").to_string();
        let project = resolve_project(&event.project_hint);
        let model = normalize_model(&event.model);

        report.by_day.entry(day).or_default().accumulate(event, cost);
        report
            .by_project
            .entry(project)
            .or_default()
            .accumulate(event, cost);
        report
            .by_model
            .entry(model)
            .or_default()
            .accumulate(event, cost);
        report
            .by_tool
            .entry(event.tool.clone())
            .or_default()
            .accumulate(event, cost);
    }

    report.totals = compute_totals(&report.by_day);
    report
}

/// A nonzero reported cost is authoritative; otherwise compute from pricing.
pub fn event_cost(event: &UsageEvent) -> f64 {
    match event.reported_cost {
        Some(c) if c != 0.0 => c,
        _ => cost_for(
            &event.model,
            event.input_tokens,
            event.output_tokens,
            event.cached_tokens,
            event.cache_write_tokens,
        ),
    }
}

fn compute_totals(by_day: &BTreeMap<String, SummaryBucket>) -> Totals {
    let mut totals = Totals::default();

    for bucket in by_day.values() {
        totals.input_tokens += bucket.input_tokens;
        totals.output_tokens += bucket.output_tokens;
        totals.cached_tokens += bucket.cached_tokens;
        totals.cost += bucket.cost;
    }

    totals.active_days = by_day.len();
    totals.avg_cost_per_day = if by_day.is_empty() {
        0.0
    } else {
        totals.cost / by_day.len() as f64
    };

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(day: u32, tool: &str, model: &str, input: u64, output: u64) -> UsageEvent {
        UsageEvent {
            tool: tool.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap(),
            model: model.to_string(),
            project_hint: format!("{tool}-proj"),
            input_tokens: input,
            output_tokens: output,
            cached_tokens: 0,
            cache_write_tokens: 0,
            reported_cost: None,
        }
    }

    #[test]
    fn order_independent_fold() {
        let a = vec![
            event(1, "gemini", "gemini-3-flash", 1000, 200),
            event(2, "codex", "gpt-5.1", 5000, 800),
        ];
        let b = vec![
            event(2, "amp", "claude-sonnet-4-5", 3000, 400),
            event(1, "gemini", "gemini-3-pro-preview", 700, 100),
        ];

        let mut ab = a.clone();
        ab.extend(b.clone());
        let mut ba = b;
        ba.extend(a);

        let r1 = aggregate(&ab);
        let r2 = aggregate(&ba);

        assert_eq!(
            serde_json::to_value(&r1).unwrap(),
            serde_json::to_value(&r2).unwrap()
        );
    }

    #[test]
    fn day_cost_is_sum_of_that_days_events() {
        let events = vec![
            event(5, "gemini", "gemini-3-flash", 1_000_000, 0),
            event(5, "gemini", "gemini-3-flash", 0, 1_000_000),
            event(6, "gemini", "gemini-3-flash", 1_000_000, 0),
        ];
        let report = aggregate(&events);

        let day5 = &report.by_day["2026-01-05"];
        assert!((day5.cost - (0.50 + 3.00)).abs() < 1e-9);
        let day6 = &report.by_day["2026-01-06"];
        assert!((day6.cost - 0.50).abs() < 1e-9);
    }

    #[test]
    fn reported_cost_supersedes_computed() {
        let mut e = event(1, "cline", "claude-sonnet-4-5", 1_000_000, 0);
        e.reported_cost = Some(9.99);
        let report = aggregate(&[e]);
        assert!((report.totals.cost - 9.99).abs() < 1e-9);

        // A zero reported cost is not authoritative
        let mut e = event(1, "cline", "claude-sonnet-4-5", 1_000_000, 0);
        e.reported_cost = Some(0.0);
        let report = aggregate(&[e]);
        assert!((report.totals.cost - 3.00).abs() < 1e-9);
    }

    #[test]
    fn model_key_is_normalized() {
        let events = vec![
            event(1, "amp", "claude-sonnet-4-5 (thinking)", 100, 0),
            event(1, "amp", "claude-sonnet-4-5-20250929", 100, 0),
        ];
        let report = aggregate(&events);
        assert_eq!(report.by_model.len(), 1);
        assert_eq!(report.by_model["claude-sonnet-4-5"].input_tokens, 200);
    }

    #[test]
    fn totals_average_guards_empty_input() {
        let report = aggregate(&[]);
        assert_eq!(report.totals.active_days, 0);
        assert_eq!(report.totals.avg_cost_per_day, 0.0);

        let events = vec![
            event(1, "gemini", "gemini-3-flash", 1_000_000, 0),
            event(3, "gemini", "gemini-3-flash", 1_000_000, 0),
        ];
        let report = aggregate(&events);
        assert_eq!(report.totals.active_days, 2);
        assert!((report.totals.avg_cost_per_day - 0.50).abs() < 1e-9);
    }
}
