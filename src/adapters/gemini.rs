use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::{compute_tool_roots, read_json, Adapter, HomeFallback, XdgBase};
use crate::types::UsageEvent;

/// Chat-session adapter: per-session JSON documents under
/// `<root>/<project-hash>/chats/session-*.json`, with a tokens sub-object on
/// qualifying messages. Project identity comes from reversing the tool's
/// trusted-folder registry, which hashes each authorized path with SHA-256.
pub struct GeminiAdapter;

impl Adapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_roots(&self) -> Vec<PathBuf> {
        compute_tool_roots(
            Some("GEMINI_CLI_HOME"),
            &["tmp"],
            &[HomeFallback {
                base: XdgBase::Home,
                subpaths: &[".gemini", "tmp"],
            }],
        )
    }

    fn produce_events(&self, root: &Path) -> Vec<UsageEvent> {
        let project_map = build_project_map(root);
        let files = discover_session_files(root);

        files
            .par_iter()
            .flat_map_iter(|path| parse_session_file(path, &project_map))
            .collect()
    }
}

/// Reverse map from path digest to registered path, built once per scan.
/// Both the exact-case and lowercased forms of each registered path are
/// hashed, since tool versions differ in which one they use for the session
/// directory name. The current working directory is added as a last
/// registry-independent candidate.
fn build_project_map(root: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();

    let registry = root.parent().map(|p| p.join("trustedFolders.json"));
    let trusted_paths = registry
        .as_deref()
        .and_then(read_json)
        .map(registry_paths)
        .unwrap_or_default();

    for path in trusted_paths {
        map.insert(sha256_hex(&path), path.clone());
        map.entry(sha256_hex(&path.to_lowercase())).or_insert(path);
    }

    if let Ok(cwd) = std::env::current_dir() {
        let cwd = cwd.to_string_lossy().into_owned();
        map.entry(sha256_hex(&cwd)).or_insert(cwd);
    }

    map
}

/// The registry is either a JSON array of paths or an object keyed by paths.
fn registry_paths(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        serde_json::Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
        _ => Vec::new(),
    }
}

fn sha256_hex(s: &str) -> String {
    format!("{:x}", Sha256::digest(s.as_bytes()))
}

/// Session documents live at `<root>/<hash>/chats/session-*.json`.
fn discover_session_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.starts_with("session-")
                && name.ends_with(".json")
                && e.path()
                    .parent()
                    .and_then(|p| p.file_name())
                    .is_some_and(|n| n == "chats")
        })
        .map(|e| e.into_path())
        .collect()
}

fn parse_session_file(path: &Path, project_map: &HashMap<String, String>) -> Vec<UsageEvent> {
    let parsed = match read_json(path) {
        Some(v) => v,
        None => return Vec::new(),
    };

    let project_hint = resolve_project_hint(path, project_map);

    let messages = match parsed.get("messages").and_then(|m| m.as_array()) {
        Some(m) => m,
        None => return Vec::new(),
    };

    messages
        .iter()
        .filter_map(|msg| extract_event(msg, &project_hint))
        .collect()
}

/// The session's containing directory (two levels up from the file, above
/// `chats/`) is named after the project-path digest.
fn resolve_project_hint(path: &Path, project_map: &HashMap<String, String>) -> String {
    let hash = path
        .parent()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if let Some(known) = project_map.get(hash) {
        return known.clone();
    }

    let prefix: String = hash.chars().take(8).collect();
    format!("Project {prefix}")
}

fn extract_event(msg: &serde_json::Value, project_hint: &str) -> Option<UsageEvent> {
    if msg.get("type").and_then(|v| v.as_str()) != Some("gemini") {
        return None;
    }
    let tokens = msg.get("tokens")?;

    let timestamp_str = msg.get("timestamp").and_then(|v| v.as_str())?;
    let timestamp: DateTime<Utc> = timestamp_str.parse().ok()?;

    let model = msg
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let input = tokens.get("input").and_then(|v| v.as_u64()).unwrap_or(0);
    let output = tokens.get("output").and_then(|v| v.as_u64()).unwrap_or(0);
    let cached = tokens.get("cached").and_then(|v| v.as_u64()).unwrap_or(0);

    Some(UsageEvent {
        tool: "gemini".to_string(),
        timestamp,
        model,
        project_hint: project_hint.to_string(),
        input_tokens: input,
        output_tokens: output,
        cached_tokens: cached,
        cache_write_tokens: 0,
        reported_cost: None,
    })
}
