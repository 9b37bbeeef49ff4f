use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{global_storage_roots, read_json, timestamp_from_millis, Adapter};
use crate::types::UsageEvent;

/// Message subtypes that report usage in per-task logs.
const USAGE_SAY_TYPES: &[&str] = &["api_req_started", "deleted_api_reqs", "subagent_usage"];

/// Task-history adapter family: several visually different VS Code extensions
/// share the same storage shape, one installation per
/// `globalStorage/<extension>` directory.
///
/// Each installation is read through exactly one path: a consolidated
/// `state/taskHistory.json` index when one parses, else a reconstruction from
/// per-task `ui_messages.json` logs. Never both, so nothing double-counts.
pub struct TaskHistoryAdapter {
    tool: &'static str,
    extension_ids: &'static [&'static str],
}

impl TaskHistoryAdapter {
    pub fn cline() -> Self {
        Self {
            tool: "cline",
            extension_ids: &["saoudrizwan.claude-dev"],
        }
    }

    pub fn roo() -> Self {
        Self {
            tool: "roo",
            extension_ids: &[
                "rooveterinaryinc.roo-cline",
                "rooveterinaryinc.roo-code-nightly",
            ],
        }
    }

    pub fn kilo() -> Self {
        Self {
            tool: "kilo",
            extension_ids: &["kilocode.kilo-code"],
        }
    }
}

impl Adapter for TaskHistoryAdapter {
    fn name(&self) -> &'static str {
        self.tool
    }

    fn default_roots(&self) -> Vec<PathBuf> {
        global_storage_roots(self.extension_ids)
    }

    fn produce_events(&self, root: &Path) -> Vec<UsageEvent> {
        let index = root.join("state").join("taskHistory.json");
        if let Some(events) = self.events_from_index(&index) {
            return events;
        }
        self.events_from_task_logs(&root.join("tasks"))
    }
}

impl TaskHistoryAdapter {
    /// `None` means "no usable index here"; the caller then falls back to the
    /// per-task scan. `Some` (even empty) claims the installation.
    fn events_from_index(&self, path: &Path) -> Option<Vec<UsageEvent>> {
        let records = read_json(path)?.as_array()?.to_vec();

        Some(
            records
                .iter()
                .filter_map(|record| self.event_from_index_record(record))
                .collect(),
        )
    }

    fn event_from_index_record(&self, record: &serde_json::Value) -> Option<UsageEvent> {
        let timestamp = record
            .get("ts")
            .and_then(|v| v.as_i64())
            .and_then(timestamp_from_millis)?;

        let input = record.get("tokensIn").and_then(|v| v.as_u64()).unwrap_or(0);
        let output = record
            .get("tokensOut")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let cache_write = record
            .get("cacheWrites")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let cache_read = record
            .get("cacheReads")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let reported_cost = record.get("totalCost").and_then(|v| v.as_f64());

        let model = record
            .get("modelId")
            .or_else(|| record.get("model"))
            .and_then(|v| v.as_str())
            .map(strip_provider_prefix)
            .unwrap_or_else(|| "unknown".to_string());

        let project_hint = record
            .get("cwdOnTaskInitialization")
            .and_then(|v| v.as_str())
            .unwrap_or(self.tool)
            .to_string();

        Some(UsageEvent {
            tool: self.tool.to_string(),
            timestamp,
            model,
            project_hint,
            input_tokens: input,
            output_tokens: output,
            cached_tokens: cache_read,
            cache_write_tokens: cache_write,
            reported_cost,
        })
    }

    /// Reconstruct per-task totals from `ui_messages.json` logs: one event per
    /// task, summing only messages tagged as usage-reporting subtypes.
    fn events_from_task_logs(&self, tasks_dir: &Path) -> Vec<UsageEvent> {
        let entries = match std::fs::read_dir(tasks_dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| self.event_from_task_dir(&e.path()))
            .collect()
    }

    fn event_from_task_dir(&self, task_dir: &Path) -> Option<UsageEvent> {
        let messages = read_json(&task_dir.join("ui_messages.json"))?
            .as_array()?
            .to_vec();

        let mut input = 0u64;
        let mut output = 0u64;
        let mut cache_read = 0u64;
        let mut cache_write = 0u64;
        let mut cost_sum = 0.0f64;
        let mut timestamp: Option<DateTime<Utc>> = None;
        let mut inline_model: Option<String> = None;
        let mut provider: Option<String> = None;
        let mut protocol: Option<String> = None;

        for msg in &messages {
            if let Some(model) = msg
                .get("modelInfo")
                .and_then(|mi| mi.get("modelId"))
                .and_then(|v| v.as_str())
            {
                inline_model.get_or_insert_with(|| model.to_string());
            }

            let say = msg.get("say").and_then(|v| v.as_str()).unwrap_or("");
            if !USAGE_SAY_TYPES.contains(&say) {
                continue;
            }

            // Usage payload is a JSON string inside the text field
            let data: serde_json::Value = msg
                .get("text")
                .and_then(|v| v.as_str())
                .and_then(|t| serde_json::from_str(t).ok())
                .unwrap_or(serde_json::Value::Null);

            input += data.get("tokensIn").and_then(|v| v.as_u64()).unwrap_or(0);
            output += data.get("tokensOut").and_then(|v| v.as_u64()).unwrap_or(0);
            cache_read += data.get("cacheReads").and_then(|v| v.as_u64()).unwrap_or(0);
            cache_write += data
                .get("cacheWrites")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            cost_sum += data.get("cost").and_then(|v| v.as_f64()).unwrap_or(0.0);

            if timestamp.is_none() {
                timestamp = msg
                    .get("ts")
                    .and_then(|v| v.as_i64())
                    .and_then(timestamp_from_millis);
            }
            if inline_model.is_none() {
                inline_model = data
                    .get("modelId")
                    .or_else(|| data.get("model"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
            }
            if provider.is_none() {
                provider = data
                    .get("inferenceProvider")
                    .and_then(|v| v.as_str())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
            }
            if protocol.is_none() {
                protocol = data
                    .get("apiProtocol")
                    .and_then(|v| v.as_str())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
            }
        }

        let timestamp = timestamp?;
        if input == 0 && output == 0 && cache_read == 0 && cache_write == 0 {
            return None;
        }

        let model = self.resolve_task_model(task_dir, inline_model, provider, protocol);

        Some(UsageEvent {
            tool: self.tool.to_string(),
            timestamp,
            model,
            project_hint: self.tool.to_string(),
            input_tokens: input,
            output_tokens: output,
            cached_tokens: cache_read,
            cache_write_tokens: cache_write,
            reported_cost: if cost_sum > 0.0 { Some(cost_sum) } else { None },
        })
    }

    /// Priority order: model tag buried in the sibling conversation-history
    /// file, then inline fields from the usage records, then the provider
    /// name, then tool plus protocol, else "unknown".
    fn resolve_task_model(
        &self,
        task_dir: &Path,
        inline_model: Option<String>,
        provider: Option<String>,
        protocol: Option<String>,
    ) -> String {
        if let Some(doc) = read_json(&task_dir.join("api_conversation_history.json")) {
            if let Some(tag) = find_model_tag(&doc, 8) {
                return strip_provider_prefix(&tag);
            }
        }

        if let Some(model) = inline_model {
            return strip_provider_prefix(&model);
        }
        if let Some(provider) = provider {
            return provider;
        }
        if let Some(protocol) = protocol {
            return format!("{}-{}", self.tool, protocol);
        }

        "unknown".to_string()
    }
}

/// `provider/model` strings reduce to the segment after the first `/`.
fn strip_provider_prefix(model: &str) -> String {
    model
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or(model)
        .to_string()
}

/// Bounded search for the first `modelId`/`model` string in a document.
fn find_model_tag(value: &serde_json::Value, depth: usize) -> Option<String> {
    if depth == 0 {
        return None;
    }

    match value {
        serde_json::Value::Object(map) => {
            for key in ["modelId", "model"] {
                if let Some(s) = map.get(key).and_then(|v| v.as_str()) {
                    if !s.is_empty() {
                        return Some(s.to_string());
                    }
                }
            }
            map.values().find_map(|v| find_model_tag(v, depth - 1))
        }
        serde_json::Value::Array(items) => items.iter().find_map(|v| find_model_tag(v, depth - 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn usage_msg(ts: i64, tokens_in: u64, tokens_out: u64, cost: f64) -> String {
        let text = serde_json::json!({
            "tokensIn": tokens_in,
            "tokensOut": tokens_out,
            "cacheReads": 0,
            "cacheWrites": 0,
            "cost": cost,
            "inferenceProvider": "openrouter",
            "apiProtocol": "anthropic",
        })
        .to_string();
        serde_json::json!({"ts": ts, "say": "api_req_started", "text": text}).to_string()
    }

    #[test]
    fn index_records_become_events_with_reported_cost() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("state").join("taskHistory.json"),
            r#"[{"ts":1767000000000,"tokensIn":12000,"tokensOut":3000,
                 "cacheWrites":400,"cacheReads":9000,"totalCost":0.42,
                 "modelId":"anthropic/claude-sonnet-4-5",
                 "cwdOnTaskInitialization":"C:\\Users\\me\\repo"}]"#,
        );

        let events = TaskHistoryAdapter::cline().produce_events(tmp.path());
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.model, "claude-sonnet-4-5");
        assert_eq!(e.reported_cost, Some(0.42));
        assert_eq!(e.cached_tokens, 9000);
        assert_eq!(e.cache_write_tokens, 400);
        assert_eq!(e.project_hint, r"C:\Users\me\repo");
    }

    #[test]
    fn index_present_skips_fallback_scan_entirely() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("state").join("taskHistory.json"),
            r#"[{"ts":1767000000000,"tokensIn":100,"tokensOut":10,"totalCost":0.01,"modelId":"glm-5"}]"#,
        );
        // A fallback task log that must NOT contribute while the index exists
        write(
            &tmp.path().join("tasks").join("t1").join("ui_messages.json"),
            &format!("[{}]", usage_msg(1767000000000, 999, 999, 9.0)),
        );

        let events = TaskHistoryAdapter::roo().produce_events(tmp.path());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].input_tokens, 100);
    }

    #[test]
    fn fallback_sums_usage_reporting_messages_per_task() {
        let tmp = tempfile::tempdir().unwrap();
        let task = tmp.path().join("tasks").join("t1");
        write(
            &task.join("ui_messages.json"),
            &format!(
                r#"[{},{},{{"ts":1767000001000,"say":"text","text":"irrelevant"}}]"#,
                usage_msg(1767000000000, 1000, 100, 0.02),
                usage_msg(1767000002000, 500, 50, 0.01),
            ),
        );

        let events = TaskHistoryAdapter::kilo().produce_events(tmp.path());
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.input_tokens, 1500);
        assert_eq!(e.output_tokens, 150);
        assert!((e.reported_cost.unwrap() - 0.03).abs() < 1e-9);
        assert_eq!(e.timestamp.timestamp_millis(), 1_767_000_000_000);
    }

    #[test]
    fn conversation_history_tag_outranks_inline_provider() {
        let tmp = tempfile::tempdir().unwrap();
        let task = tmp.path().join("tasks").join("t1");
        write(
            &task.join("ui_messages.json"),
            &format!("[{}]", usage_msg(1767000000000, 10, 5, 0.0)),
        );
        write(
            &task.join("api_conversation_history.json"),
            r#"[{"role":"assistant","content":[{"type":"text","text":"hi"}],
                 "metadata":{"modelId":"kilocode/gemini-3-flash"}}]"#,
        );

        let events = TaskHistoryAdapter::kilo().produce_events(tmp.path());
        assert_eq!(events[0].model, "gemini-3-flash");
    }

    #[test]
    fn provider_then_protocol_then_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let task = tmp.path().join("tasks").join("t1");
        write(
            &task.join("ui_messages.json"),
            &format!("[{}]", usage_msg(1767000000000, 10, 5, 0.0)),
        );

        // No conversation history, no inline model: provider field wins
        let events = TaskHistoryAdapter::cline().produce_events(tmp.path());
        assert_eq!(events[0].model, "openrouter");

        // Without provider either, tool + protocol composes the label
        let tmp = tempfile::tempdir().unwrap();
        let text = serde_json::json!({"tokensIn": 10, "tokensOut": 5, "apiProtocol": "openai"})
            .to_string();
        let msg =
            serde_json::json!({"ts": 1767000000000i64, "say": "api_req_started", "text": text});
        write(
            &tmp.path().join("tasks").join("t1").join("ui_messages.json"),
            &format!("[{msg}]"),
        );
        let events = TaskHistoryAdapter::cline().produce_events(tmp.path());
        assert_eq!(events[0].model, "cline-openai");
    }

    #[test]
    fn unparseable_index_falls_back_to_task_scan() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("state").join("taskHistory.json"), "{ nope");
        write(
            &tmp.path().join("tasks").join("t1").join("ui_messages.json"),
            &format!("[{}]", usage_msg(1767000000000, 10, 5, 0.0)),
        );

        let events = TaskHistoryAdapter::cline().produce_events(tmp.path());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].input_tokens, 10);
    }

    #[test]
    fn zero_usage_tasks_emit_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            &tmp.path().join("tasks").join("t1").join("ui_messages.json"),
            r#"[{"ts":1767000000000,"say":"text","text":"chatter"}]"#,
        );

        assert!(TaskHistoryAdapter::cline()
            .produce_events(tmp.path())
            .is_empty());
    }
}
