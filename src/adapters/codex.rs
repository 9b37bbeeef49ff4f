use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;

use super::{compute_tool_roots, discover_files, Adapter, HomeFallback, XdgBase};
use crate::types::UsageEvent;

/// Rollout-log adapter: append-only JSONL session logs grouped under
/// date-stamped directories (`<root>/YYYY/MM/DD/rollout-*.jsonl`).
///
/// This is the one scan with order-dependent semantics: context-change lines
/// set the "current model", which applies to every following token-count line
/// in the same file until changed again. Individual lines carry no timestamp
/// the adapter trusts; the event date comes from the directory stamp.
pub struct CodexAdapter;

impl Adapter for CodexAdapter {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn default_roots(&self) -> Vec<PathBuf> {
        compute_tool_roots(
            Some("CODEX_HOME"),
            &["sessions"],
            &[
                HomeFallback {
                    base: XdgBase::Home,
                    subpaths: &[".codex", "sessions"],
                },
                HomeFallback {
                    base: XdgBase::Config,
                    subpaths: &["codex", "sessions"],
                },
            ],
        )
    }

    fn produce_events(&self, root: &Path) -> Vec<UsageEvent> {
        let files = discover_files(root, "jsonl");

        files
            .par_iter()
            .flat_map_iter(|path| parse_rollout_file(path))
            .collect()
    }
}

/// Event date from the `YYYY/MM/DD` directory components nearest the file.
fn date_from_path(path: &Path) -> Option<NaiveDate> {
    let components: Vec<&str> = path
        .parent()?
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    let mut found = None;
    for window in components.windows(3) {
        if window[0].len() != 4 {
            continue;
        }
        if let (Ok(y), Ok(m), Ok(d)) = (
            window[0].parse::<i32>(),
            window[1].parse::<u32>(),
            window[2].parse::<u32>(),
        ) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                found = Some(date);
            }
        }
    }
    found
}

fn parse_rollout_file(path: &Path) -> Vec<UsageEvent> {
    let date = match date_from_path(path) {
        Some(d) => d,
        None => return Vec::new(),
    };
    let timestamp: DateTime<Utc> = match date.and_hms_opt(0, 0, 0) {
        Some(dt) => dt.and_utc(),
        None => return Vec::new(),
    };

    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };

    let reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut current_model: Option<String> = None;

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };

        // Fast pre-filter: only parse lines that can matter
        if line.contains("\"turn_context\"") {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&line) {
                if let Some(model) = extract_context_model(&parsed) {
                    current_model = Some(model);
                }
            }
            continue;
        }

        if !line.contains("\"token_count\"") {
            continue;
        }

        let parsed: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if let Some(event) = extract_token_event(&parsed, timestamp, &current_model) {
            events.push(event);
        }
    }

    events
}

fn extract_context_model(parsed: &serde_json::Value) -> Option<String> {
    let payload = parsed.get("payload")?;

    payload
        .get("model")
        .and_then(|v| v.as_str())
        .or_else(|| {
            payload
                .get("info")
                .and_then(|i| i.get("model"))
                .and_then(|v| v.as_str())
        })
        .map(str::to_string)
}

fn extract_token_event(
    parsed: &serde_json::Value,
    timestamp: DateTime<Utc>,
    current_model: &Option<String>,
) -> Option<UsageEvent> {
    let payload = parsed.get("payload")?;
    if payload.get("type").and_then(|v| v.as_str()) != Some("token_count") {
        return None;
    }

    let usage = payload.get("info")?.get("last_token_usage")?;

    let input = usage
        .get("input_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let output = usage
        .get("output_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let cached = usage
        .get("cached_input_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    if input == 0 && output == 0 {
        return None;
    }

    let model = current_model.clone().unwrap_or_else(|| "gpt-5".to_string());

    Some(UsageEvent {
        tool: "codex".to_string(),
        timestamp,
        model,
        project_hint: "codex".to_string(),
        input_tokens: input,
        output_tokens: output,
        cached_tokens: cached,
        cache_write_tokens: 0,
        reported_cost: None,
    })
}
