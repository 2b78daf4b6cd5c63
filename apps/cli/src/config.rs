//! CLI configuration.
//!
//! Reads TOML at `~/.config/castup/config.toml` unless another path is given.
//! Every key is optional:
//!
//! ```toml
//! base_url = "https://media.example.com"
//!
//! [headers]
//! Cookie = "session=abc123"
//!
//! [uploader]
//! chunk_size = 5242880
//! concurrency = 4
//! request_timeout_ms = 60000
//!
//! [uploader.endpoints]
//! chunk_upload = "/api/upload/chunk"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use castup_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL the endpoint paths are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub uploader: UploaderConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            headers: BTreeMap::new(),
            uploader: UploaderConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration.
    ///
    /// An explicit `path` must exist and parse. The default file is optional;
    /// when it is missing or malformed the defaults are used.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }

        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        match Self::read(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to load config, using defaults: {e:#}");
                Ok(Self::default())
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

pub fn config_file_path() -> PathBuf {
    config_base_dir().join("castup").join("config.toml")
}

fn config_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}
