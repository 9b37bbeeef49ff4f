use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Canonical record of one billable interaction, as emitted by an adapter.
///
/// Token counts are unsigned so the "never negative" invariant holds by
/// construction. `input_tokens` is assumed inclusive of `cached_tokens` and
/// `cache_write_tokens` (provider accounting convention); the cost formula
/// subtracts both before applying the base input rate.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    /// Free-form project identity: a path, an opaque hash, or a short name.
    /// Resolved to a display name by `project::resolve_project`.
    pub project_hint: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub cache_write_tokens: u64,
    /// Authoritative cost carried by the source record. When present and
    /// nonzero it supersedes the computed cost.
    pub reported_cost: Option<f64>,
}

/// Accumulator shared by all four summary tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryBucket {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost: f64,
}

impl SummaryBucket {
    pub fn accumulate(&mut self, event: &UsageEvent, cost: f64) {
        self.input_tokens += event.input_tokens;
        self.output_tokens += event.output_tokens;
        self.cached_tokens += event.cached_tokens;
        self.cache_write_tokens += event.cache_write_tokens;
        self.cost += cost;
    }

    pub fn accumulate_from(&mut self, other: &SummaryBucket) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_tokens += other.cached_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
        self.cost += other.cost;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub cost: f64,
    /// Days with at least one event.
    pub active_days: usize,
    pub avg_cost_per_day: f64,
}

/// Final output of one run: four keyed summary tables plus grand totals.
/// BTreeMap keys give deterministic iteration for rendering.
#[derive(Debug, Default, Serialize)]
pub struct UsageReport {
    pub by_day: BTreeMap<String, SummaryBucket>,
    pub by_project: BTreeMap<String, SummaryBucket>,
    pub by_model: BTreeMap<String, SummaryBucket>,
    pub by_tool: BTreeMap<String, SummaryBucket>,
    pub totals: Totals,
}
