use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectAlias {
    pub key: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_legacy_file")]
    pub legacy_file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_link_display_cap")]
    pub link_display_cap: usize,
    #[serde(default = "default_stats_top_components")]
    pub stats_top_components: usize,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_host")]
    pub host: String,
    #[serde(default = "default_monitor_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub projects: Vec<ProjectAlias>,
}

impl AppConfig {
    /// Project key to display label, keys with empty labels omitted.
    pub fn project_labels(&self) -> HashMap<String, String> {
        self.projects
            .iter()
            .filter(|alias| !alias.label.trim().is_empty())
            .map(|alias| (alias.key.clone(), alias.label.clone()))
            .collect()
    }

    pub fn index_path(&self) -> PathBuf {
        Path::new(&self.snapshot.dir).join(&self.snapshot.index_file)
    }

    pub fn log_path(&self) -> PathBuf {
        Path::new(&self.snapshot.dir).join(&self.snapshot.log_file)
    }

    pub fn legacy_path(&self) -> PathBuf {
        Path::new(&self.snapshot.dir).join(&self.snapshot.legacy_file)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            index_file: default_index_file(),
            log_file: default_log_file(),
            legacy_file: default_legacy_file(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            link_display_cap: default_link_display_cap(),
            stats_top_components: default_stats_top_components(),
            preview_rows: default_preview_rows(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: default_monitor_host(),
            port: default_monitor_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot: SnapshotConfig::default(),
            engine: EngineConfig::default(),
            monitor: MonitorConfig::default(),
            projects: Vec::new(),
        }
    }
}

fn default_snapshot_dir() -> String {
    "~/.shipwatch/snapshots".to_string()
}

fn default_index_file() -> String {
    "deploy-index.json".to_string()
}

fn default_log_file() -> String {
    "deploy-log.ndjson".to_string()
}

fn default_legacy_file() -> String {
    "deployments.json".to_string()
}

fn default_link_display_cap() -> usize {
    5
}

fn default_stats_top_components() -> usize {
    10
}

fn default_preview_rows() -> usize {
    5
}

fn default_monitor_host() -> String {
    "127.0.0.1".to_string()
}

fn default_monitor_port() -> u16 {
    8750
}

fn default_static_dir() -> String {
    "static".to_string()
}

pub fn expand_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), stripped);
        }
    }
    path.to_string()
}

fn home_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".shipwatch").join("config.toml"))
}

fn repo_default_config_path() -> PathBuf {
    PathBuf::from("config/shipwatch.toml")
}

fn resolve_config_path_with_overrides(
    raw_path: Option<PathBuf>,
    env_keys: &[&str],
    home_path: Option<PathBuf>,
    repo_default: PathBuf,
) -> PathBuf {
    if let Some(path) = raw_path {
        return path;
    }

    for key in env_keys {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
    }

    if let Some(path) = home_path {
        if path.exists() {
            return path;
        }
    }

    if repo_default.exists() {
        return repo_default;
    }

    home_config_path().unwrap_or(repo_default)
}

pub fn resolve_config_path(raw_path: Option<PathBuf>) -> PathBuf {
    resolve_config_path_with_overrides(
        raw_path,
        &["SHIPWATCH_CONFIG"],
        home_config_path(),
        repo_default_config_path(),
    )
}

fn normalize_config(mut cfg: AppConfig) -> AppConfig {
    cfg.snapshot.dir = expand_path(&cfg.snapshot.dir);
    cfg.monitor.static_dir = expand_path(&cfg.monitor.static_dir);
    cfg
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
    let cfg: AppConfig = toml::from_str(&content).context("failed to parse TOML config")?;
    Ok(normalize_config(cfg))
}
