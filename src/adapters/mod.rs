pub mod amp;
pub mod codex;
pub mod gemini;
pub mod opencode;
pub mod taskhist;

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use walkdir::WalkDir;

use crate::types::UsageEvent;

/// One source tool's ingestion path.
///
/// `produce_events` is a single finite pass over the files beneath one storage
/// root. A missing root yields an empty vector; a file or record that fails to
/// parse is skipped without aborting the rest of the scan. No adapter call is
/// ever an error.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidate storage roots for this tool on the current machine. Root
    /// enumeration is a convenience for the binary; the core scan always
    /// takes an explicit root.
    fn default_roots(&self) -> Vec<PathBuf>;

    fn produce_events(&self, root: &Path) -> Vec<UsageEvent>;
}

pub fn all_adapters() -> Vec<Box<dyn Adapter>> {
    vec![
        Box::new(gemini::GeminiAdapter),
        Box::new(codex::CodexAdapter),
        Box::new(opencode::OpenCodeAdapter),
        Box::new(amp::AmpAdapter),
        Box::new(taskhist::TaskHistoryAdapter::cline()),
        Box::new(taskhist::TaskHistoryAdapter::roo()),
        Box::new(taskhist::TaskHistoryAdapter::kilo()),
    ]
}

/// Recursively collect files under `root` with the given extension.
pub(crate) fn discover_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
        .map(|e| e.into_path())
        .collect()
}

/// Whole-file JSON read; any I/O or parse failure reads as "no document".
pub(crate) fn read_json(path: &Path) -> Option<serde_json::Value> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

pub(crate) fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// XDG base directory kind, determining which env var and fallback to use.
pub(crate) enum XdgBase {
    /// Uses XDG_CONFIG_HOME, falls back to ~/.config
    Config,
    /// Uses XDG_DATA_HOME, falls back to ~/.local/share
    Data,
    /// Direct ~/.<name> path (legacy tool defaults)
    Home,
}

/// A home-relative fallback path: XDG base kind + subpath segments to join.
pub(crate) struct HomeFallback {
    pub base: XdgBase,
    pub subpaths: &'static [&'static str],
}

/// Compute candidate tool roots using a common pattern:
///
/// 1. If `env_var` is set, use its value joined with each of `env_subpaths`
/// 2. Otherwise, for each `HomeFallback`, resolve the XDG base directory
///    and join its subpath segments
///
/// Returns an empty Vec if neither the env var nor HOME is available.
pub(crate) fn compute_tool_roots(
    env_var: Option<&str>,
    env_subpaths: &[&str],
    home_fallbacks: &[HomeFallback],
) -> Vec<PathBuf> {
    if let Some(var_name) = env_var {
        if let Ok(val) = std::env::var(var_name) {
            let base = PathBuf::from(val);
            if env_subpaths.is_empty() {
                return vec![base];
            }
            return env_subpaths.iter().map(|sub| base.join(sub)).collect();
        }
    }

    let home = match std::env::var_os("HOME").map(PathBuf::from) {
        Some(h) => h,
        None => return Vec::new(),
    };

    home_fallbacks
        .iter()
        .map(|fb| {
            let base = match fb.base {
                XdgBase::Config => std::env::var("XDG_CONFIG_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| home.join(".config")),
                XdgBase::Data => std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| home.join(".local").join("share")),
                XdgBase::Home => home.clone(),
            };
            let mut path = base;
            for seg in fb.subpaths {
                path = path.join(seg);
            }
            path
        })
        .collect()
}

/// IDE user-data directories that can host VS Code-family extension storage.
const IDE_DIRS: &[&str] = &["Code", "Code - Insiders", "Cursor", "Windsurf", "Antigravity"];

/// Extension global-storage roots across every known IDE installation.
/// Each returned path is one installation: `<ide>/User/globalStorage/<ext>`.
pub(crate) fn global_storage_roots(extension_ids: &[&str]) -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = Vec::new();

    // Windows keeps IDE user data under APPDATA; elsewhere it lives in the
    // XDG config directory.
    if let Some(appdata) = std::env::var_os("APPDATA").map(PathBuf::from) {
        bases.push(appdata);
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        let config = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"));
        bases.push(config);
    }

    let mut roots = Vec::new();
    for base in &bases {
        for ide in IDE_DIRS {
            for ext in extension_ids {
                roots.push(base.join(ide).join("User").join("globalStorage").join(ext));
            }
        }
    }
    roots
}
