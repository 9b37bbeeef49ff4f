use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::{compute_tool_roots, read_json, timestamp_from_millis, Adapter, HomeFallback, XdgBase};
use crate::types::UsageEvent;

/// Model assumed when a thread gives no other signal.
const FALLBACK_MODEL: &str = "claude-sonnet-4-5";

/// Usage records declaring a context limit above this are attributed to the
/// 1M-context model family. Heuristic of unknown reliability, reproduced as
/// observed in the wild; revisit if it misattributes.
const LONG_CONTEXT_THRESHOLD: u64 = 400_000;
const LONG_CONTEXT_MODEL: &str = "gemini-3-pro-preview";

/// Nested tool-invocation payloads are walked at most this deep.
const MAX_VISIT_DEPTH: usize = 16;

/// Thread-log adapter: self-contained thread documents (`T-*` files), each
/// with an embedded message list and environment metadata. Besides top-level
/// message usage, a bounded recursive walk over message content recovers
/// secondary usage blocks buried in tool-call payloads, such as an
/// image-generation sub-call inside a user-authored message.
pub struct AmpAdapter;

impl Adapter for AmpAdapter {
    fn name(&self) -> &'static str {
        "amp"
    }

    fn default_roots(&self) -> Vec<PathBuf> {
        compute_tool_roots(
            Some("AMP_DATA_DIR"),
            &["threads"],
            &[HomeFallback {
                base: XdgBase::Data,
                subpaths: &["amp", "threads"],
            }],
        )
    }

    fn produce_events(&self, root: &Path) -> Vec<UsageEvent> {
        let files = discover_thread_files(root);

        files
            .par_iter()
            .flat_map_iter(|path| parse_thread_file(path))
            .collect()
    }
}

/// Thread documents are named after their thread id (`T-...`), with or
/// without a `.json` suffix.
fn discover_thread_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().starts_with("T-"))
        .map(|e| e.into_path())
        .collect()
}

fn parse_thread_file(path: &Path) -> Vec<UsageEvent> {
    let parsed = match read_json(path) {
        Some(v) => v,
        None => return Vec::new(),
    };

    let timestamp = match parsed
        .get("created")
        .and_then(|v| v.as_i64())
        .and_then(timestamp_from_millis)
    {
        Some(ts) => ts,
        None => return Vec::new(),
    };

    let project_hint = resolve_thread_project(&parsed);
    let tag_model = thread_tag_model(&parsed);

    let messages = match parsed.get("messages").and_then(|m| m.as_array()) {
        Some(m) => m,
        None => return Vec::new(),
    };

    let mut events = Vec::new();

    for msg in messages {
        if let Some(usage) = msg.get("usage").filter(|u| u.is_object()) {
            if let Some(event) = extract_usage_event(usage, timestamp, &project_hint, &tag_model) {
                events.push(event);
            }
        }

        // Secondary usage blocks inside tool-invocation payloads
        if let Some(content) = msg.get("content") {
            let mut nested = Vec::new();
            collect_nested_usage(content, MAX_VISIT_DEPTH, &mut nested);
            for usage in nested {
                if let Some(event) = extract_usage_event(usage, timestamp, &project_hint, &tag_model)
                {
                    events.push(event);
                }
            }
        }
    }

    events
}

/// Project identity preference: repository URL basename (minus `.git`), then
/// a declared display name, then the thread title, then the thread id.
fn resolve_thread_project(parsed: &serde_json::Value) -> String {
    let trees = parsed
        .get("env")
        .and_then(|e| e.get("initial"))
        .and_then(|i| i.get("trees"))
        .and_then(|t| t.as_array());

    if let Some(trees) = trees {
        for tree in trees {
            if let Some(url) = tree
                .get("repository")
                .and_then(|r| r.get("url"))
                .and_then(|v| v.as_str())
            {
                if let Some(name) = repo_basename(url) {
                    return name;
                }
            }
        }
        for tree in trees {
            if let Some(name) = tree.get("displayName").and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    if let Some(title) = parsed.get("title").and_then(|v| v.as_str()) {
        if !title.is_empty() {
            return title.to_string();
        }
    }

    parsed
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or("amp")
        .to_string()
}

fn repo_basename(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Thread-level `model:<id>` tag, ignoring an explicit "undefined" sentinel.
fn thread_tag_model(parsed: &serde_json::Value) -> Option<String> {
    let tags = parsed
        .get("env")
        .and_then(|e| e.get("initial"))
        .and_then(|i| i.get("tags"))
        .and_then(|t| t.as_array())?;

    tags.iter()
        .filter_map(|t| t.as_str())
        .filter_map(|t| t.strip_prefix("model:"))
        .find(|m| !m.is_empty() && *m != "undefined")
        .map(str::to_string)
}

/// Walk a content tree looking for `usage` objects, skipping embedded binary
/// payload fields so traversal stays cheap.
fn collect_nested_usage<'a>(
    value: &'a serde_json::Value,
    depth: usize,
    out: &mut Vec<&'a serde_json::Value>,
) {
    if depth == 0 {
        return;
    }

    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                if key == "data" || key == "base64" {
                    continue;
                }
                if key == "usage" && child.is_object() {
                    out.push(child);
                    continue;
                }
                collect_nested_usage(child, depth - 1, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_nested_usage(item, depth - 1, out);
            }
        }
        _ => {}
    }
}

fn extract_usage_event(
    usage: &serde_json::Value,
    timestamp: DateTime<Utc>,
    project_hint: &str,
    tag_model: &Option<String>,
) -> Option<UsageEvent> {
    let input = token_field(usage, &["inputTokens", "input_tokens", "input"]);
    let output = token_field(usage, &["outputTokens", "output_tokens", "output"]);
    let cached = token_field(
        usage,
        &["cacheReadInputTokens", "cache_read_input_tokens"],
    );
    let cache_write = token_field(
        usage,
        &["cacheCreationInputTokens", "cache_creation_input_tokens"],
    );

    if input == 0 && output == 0 {
        return None;
    }

    let model = resolve_usage_model(usage, tag_model);

    Some(UsageEvent {
        tool: "amp".to_string(),
        timestamp,
        model,
        project_hint: project_hint.to_string(),
        input_tokens: input,
        output_tokens: output,
        cached_tokens: cached,
        cache_write_tokens: cache_write,
        reported_cost: None,
    })
}

fn token_field(usage: &serde_json::Value, names: &[&str]) -> u64 {
    names
        .iter()
        .find_map(|n| usage.get(*n).and_then(|v| v.as_u64()))
        .unwrap_or(0)
}

/// Model identity preference: explicit field on the record, then the
/// long-context inference, then the thread tag, then the fixed fallback.
fn resolve_usage_model(usage: &serde_json::Value, tag_model: &Option<String>) -> String {
    if let Some(model) = usage.get("model").and_then(|v| v.as_str()) {
        if !model.is_empty() {
            return model.to_string();
        }
    }

    let max_input = token_field(usage, &["maxInputTokens", "contextWindow"]);
    if max_input > LONG_CONTEXT_THRESHOLD {
        return LONG_CONTEXT_MODEL.to_string();
    }

    if let Some(model) = tag_model {
        return model.clone();
    }

    FALLBACK_MODEL.to_string()
}
