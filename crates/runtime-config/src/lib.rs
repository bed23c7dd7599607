//! Runtime configuration for the NeosNoize daemon.
//!
//! The daemon reads a flat `neosnoize.toml`. Keys it does not know are
//! stripped and keys that are missing are filled with defaults; the
//! normalized file is written back so operators can see every option.
//! Relative paths are resolved against the install root, the directory that
//! holds the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "neosnoize.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeosNoizeConfig {
    /// Serve `web_root` over HTTP.
    #[serde(default = "default_false")]
    pub express: bool,
    #[serde(default = "default_express_port")]
    pub express_port: u16,
    /// Directory holding cached thumbnail images.
    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: String,
    /// Public prefix for rewritten thumbnail links. Values already starting
    /// with it are treated as local.
    #[serde(default = "default_thumbnail_url")]
    pub thumbnail_url: String,
    #[serde(default = "default_sessions_file")]
    pub sessions_file: String,
    /// Polling interval in milliseconds.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
    #[serde(default = "default_web_root")]
    pub web_root: String,
    #[serde(default = "default_sessions_endpoint")]
    pub sessions_endpoint: String,
    /// Base URL platform asset identifiers are resolved against.
    #[serde(default = "default_assets_url")]
    pub assets_url: String,
    /// Per-request HTTP timeout, 0 disables it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for NeosNoizeConfig {
    fn default() -> Self {
        Self {
            express: false,
            express_port: default_express_port(),
            thumbnail_dir: default_thumbnail_dir(),
            thumbnail_url: default_thumbnail_url(),
            sessions_file: default_sessions_file(),
            update_interval: default_update_interval(),
            web_root: default_web_root(),
            sessions_endpoint: default_sessions_endpoint(),
            assets_url: default_assets_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Filesystem locations after resolution against the install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub thumbnail_dir: PathBuf,
    pub sessions_file: PathBuf,
    pub web_root: PathBuf,
}

impl NeosNoizeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval == 0 {
            return Err(ConfigError::Invalid(
                "update_interval must be greater than 0".to_string(),
            ));
        }
        if self.thumbnail_url.is_empty() {
            return Err(ConfigError::Invalid(
                "thumbnail_url must not be empty".to_string(),
            ));
        }
        for (key, value) in [
            ("sessions_endpoint", &self.sessions_endpoint),
            ("assets_url", &self.assets_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be an http(s) URL, got '{value}'"
                )));
            }
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn resolve_paths(&self, root: &Path) -> RuntimePaths {
        RuntimePaths {
            thumbnail_dir: resolve_against(root, &self.thumbnail_dir),
            sessions_file: resolve_against(root, &self.sessions_file),
            web_root: resolve_against(root, &self.web_root),
        }
    }
}

fn resolve_against(root: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Result of [`load_or_init`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: NeosNoizeConfig,
    pub path: PathBuf,
    /// Keys found in the file that are not config options.
    pub stripped_keys: Vec<String>,
    /// Whether the normalized config was written back to `path`.
    pub written: bool,
}

impl LoadedConfig {
    /// Directory holding the config file.
    pub fn install_root(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Load the config at `path`, normalize it and persist it back.
///
/// A missing file yields the defaults, which are then written out.
pub fn load_or_init(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let existing = if path.exists() {
        Some(std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?)
    } else {
        None
    };

    let (config, stripped_keys) = match existing.as_deref() {
        Some(content) => parse_config(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        None => (NeosNoizeConfig::default(), Vec::new()),
    };

    let rendered = toml::to_string_pretty(&config)?;
    let written = existing.as_deref() != Some(rendered.as_str());
    if written {
        write_config(path, &rendered)?;
    }

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        stripped_keys,
        written,
    })
}

/// Parse TOML into the config and report unrecognised top-level keys.
pub fn parse_config(content: &str) -> Result<(NeosNoizeConfig, Vec<String>), toml::de::Error> {
    let table: toml::Table = toml::from_str(content)?;
    let known = known_keys();
    let stripped = table
        .keys()
        .filter(|key| !known.contains(&key.as_str()))
        .cloned()
        .collect();
    let config: NeosNoizeConfig = toml::Value::Table(table).try_into()?;
    Ok((config, stripped))
}

fn known_keys() -> Vec<&'static str> {
    vec![
        "express",
        "express_port",
        "thumbnail_dir",
        "thumbnail_url",
        "sessions_file",
        "update_interval",
        "web_root",
        "sessions_endpoint",
        "assets_url",
        "request_timeout_secs",
    ]
}

fn write_config(path: &Path, rendered: &str) -> Result<(), ConfigError> {
    let to_write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_write_err)?;
    }
    std::fs::write(path, rendered).map_err(to_write_err)
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_false() -> bool {
    false
}
fn default_express_port() -> u16 {
    8080
}
fn default_thumbnail_dir() -> String {
    "html/thumbnails/".to_string()
}
fn default_thumbnail_url() -> String {
    "thumbnails/".to_string()
}
fn default_sessions_file() -> String {
    "html/sessions.json".to_string()
}
fn default_update_interval() -> u64 {
    6000
}
fn default_web_root() -> String {
    "html/".to_string()
}
fn default_sessions_endpoint() -> String {
    "https://api.neos.com/api/sessions".to_string()
}
fn default_assets_url() -> String {
    "https://assets.neos.com/assets/".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
