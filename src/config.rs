use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// User configuration, read from `config.toml` in the platform config dir.
///
/// ```toml
/// [roots]
/// codex = ["/mnt/backup/codex/sessions"]
/// ```
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Per-tool storage-root overrides. A tool listed here scans exactly
    /// these directories instead of its built-in candidates.
    #[serde(default)]
    pub roots: HashMap<String, Vec<PathBuf>>,
}

impl Config {
    pub fn roots_for(&self, tool: &str) -> Option<&Vec<PathBuf>> {
        self.roots.get(tool)
    }
}

pub fn load_config() -> Config {
    let Some(dirs) = ProjectDirs::from("", "", "aicost") else {
        return Config::default();
    };

    let path = dirs.config_dir().join("config.toml");
    let Ok(data) = fs::read_to_string(&path) else {
        return Config::default();
    };

    match toml::from_str(&data) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: invalid config at {}: {}", path.display(), e);
            Config::default()
        }
    }
}
