use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use super::{
    compute_tool_roots, discover_files, read_json, timestamp_from_millis, Adapter, HomeFallback,
    XdgBase,
};
use crate::types::UsageEvent;

/// Keyed-store adapter: one JSON object per session under `<root>/session/`
/// and separately stored message objects under `<root>/message/`, keyed by
/// session id. Messages missing their own creation time fall back to the
/// parent session's.
pub struct OpenCodeAdapter;

impl Adapter for OpenCodeAdapter {
    fn name(&self) -> &'static str {
        "opencode"
    }

    fn default_roots(&self) -> Vec<PathBuf> {
        compute_tool_roots(
            Some("OPENCODE_DATA_DIR"),
            &["storage"],
            &[HomeFallback {
                base: XdgBase::Data,
                subpaths: &["opencode", "storage"],
            }],
        )
    }

    fn produce_events(&self, root: &Path) -> Vec<UsageEvent> {
        let sessions = load_sessions(root);

        let files = discover_files(&root.join("message"), "json");
        files
            .par_iter()
            .filter_map(|path| parse_message_file(path, &sessions))
            .collect()
    }
}

struct SessionMeta {
    created: Option<DateTime<Utc>>,
    project: String,
}

/// Load all session objects into an id-keyed map for time and project lookups.
fn load_sessions(root: &Path) -> HashMap<String, SessionMeta> {
    let mut map = HashMap::new();

    for file in discover_files(&root.join("session"), "json") {
        let parsed = match read_json(&file) {
            Some(v) => v,
            None => continue,
        };

        let id = match parsed.get("id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => continue,
        };

        let created = parsed
            .get("time")
            .and_then(|t| t.get("created"))
            .and_then(|v| v.as_i64())
            .and_then(timestamp_from_millis);

        // Directory basename as project name, fall back to projectID
        let project = parsed
            .get("directory")
            .and_then(|v| v.as_str())
            .and_then(|d| d.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .or_else(|| parsed.get("projectID").and_then(|v| v.as_str()))
            .unwrap_or("opencode")
            .to_string();

        map.insert(id, SessionMeta { created, project });
    }

    map
}

fn parse_message_file(
    path: &Path,
    sessions: &HashMap<String, SessionMeta>,
) -> Option<UsageEvent> {
    let parsed = read_json(path)?;

    let model = parsed.get("modelID").and_then(|v| v.as_str())?.to_string();

    // Message files are grouped in per-session directories; the embedded
    // field wins when present.
    let session_id = parsed
        .get("sessionID")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| {
            path.parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let session = sessions.get(&session_id);

    let timestamp = parsed
        .get("time")
        .and_then(|t| t.get("created"))
        .and_then(|v| v.as_i64())
        .and_then(timestamp_from_millis)
        .or_else(|| session.and_then(|s| s.created))?;

    let tokens = parsed.get("tokens")?;
    let input = tokens.get("input").and_then(|v| v.as_u64()).unwrap_or(0);
    let output = tokens.get("output").and_then(|v| v.as_u64()).unwrap_or(0);
    let cache_read = tokens
        .get("cache")
        .and_then(|c| c.get("read"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let cache_write = tokens
        .get("cache")
        .and_then(|c| c.get("write"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    if input == 0 && output == 0 && cache_read == 0 && cache_write == 0 {
        return None;
    }

    let project_hint = session
        .map(|s| s.project.clone())
        .unwrap_or_else(|| "opencode".to_string());

    Some(UsageEvent {
        tool: "opencode".to_string(),
        timestamp,
        model,
        project_hint,
        input_tokens: input,
        output_tokens: output,
        cached_tokens: cache_read,
        cache_write_tokens: cache_write,
        reported_cost: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn message_joins_session_project_and_own_time() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        write(
            &root.join("session").join("ses_1.json"),
            r#"{"id":"ses_1","directory":"/home/me/code/widget","time":{"created":1767000000000}}"#,
        );
        write(
            &root.join("message").join("ses_1").join("msg_1.json"),
            r#"{"sessionID":"ses_1","modelID":"claude-sonnet-4-5",
                "tokens":{"input":900,"output":120,"cache":{"read":300,"write":40}},
                "time":{"created":1767003600000}}"#,
        );

        let events = OpenCodeAdapter.produce_events(root);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.project_hint, "widget");
        assert_eq!(e.model, "claude-sonnet-4-5");
        assert_eq!(e.cached_tokens, 300);
        assert_eq!(e.cache_write_tokens, 40);
        assert_eq!(e.timestamp.timestamp_millis(), 1_767_003_600_000);
    }

    #[test]
    fn message_without_time_uses_session_creation() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        write(
            &root.join("session").join("ses_2.json"),
            r#"{"id":"ses_2","time":{"created":1767000000000}}"#,
        );
        write(
            &root.join("message").join("ses_2").join("msg_1.json"),
            r#"{"sessionID":"ses_2","modelID":"glm-5","tokens":{"input":50,"output":10}}"#,
        );

        let events = OpenCodeAdapter.produce_events(root);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp.timestamp_millis(), 1_767_000_000_000);
        assert_eq!(events[0].project_hint, "opencode");
    }

    #[test]
    fn zero_token_messages_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        write(
            &root.join("session").join("ses_3.json"),
            r#"{"id":"ses_3","time":{"created":1767000000000}}"#,
        );
        write(
            &root.join("message").join("ses_3").join("msg_1.json"),
            r#"{"sessionID":"ses_3","modelID":"glm-5","tokens":{"input":0,"output":0}}"#,
        );

        assert!(OpenCodeAdapter.produce_events(root).is_empty());
    }

    #[test]
    fn message_without_any_time_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        write(
            &root.join("message").join("ses_x").join("msg_1.json"),
            r#"{"modelID":"glm-5","tokens":{"input":5,"output":5}}"#,
        );

        assert!(OpenCodeAdapter.produce_events(root).is_empty());
    }
}
