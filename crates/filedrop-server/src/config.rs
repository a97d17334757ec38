use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use filedrop_core::config::DEFAULT_MAX_UPLOAD_MB;
use serde::Deserialize;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "filedrop.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Request body ceiling in megabytes.
    pub max_size_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            max_size_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub upload_dir: Option<PathBuf>,
    pub max_size_mb: Option<u64>,
}

impl Config {
    /// Read `path` if given (it must exist), otherwise [`DEFAULT_CONFIG_FILE`]
    /// when present, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `PORT`, `UPLOAD_DIR` and `MAX_SIZE` from the environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::apply_env`] with a custom lookup. Empty values are
    /// treated as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value {:?}", port))?;
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(max_size) = get("MAX_SIZE") {
            self.storage.max_size_mb = parse_max_size(&max_size);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(dir) = &overrides.upload_dir {
            self.storage.upload_dir = dir.clone();
        }
        if let Some(max_size_mb) = overrides.max_size_mb {
            self.storage.max_size_mb = max_size_mb;
        }
        if self.storage.max_size_mb == 0 {
            tracing::warn!(
                "Max upload size of 0 MB would reject every upload, using {} MB",
                DEFAULT_MAX_UPLOAD_MB
            );
            self.storage.max_size_mb = DEFAULT_MAX_UPLOAD_MB;
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}

/// An unparsable size is not fatal: the default ceiling is used instead.
fn parse_max_size(raw: &str) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(mb) => mb,
        Err(_) => {
            tracing::warn!(
                "Invalid MAX_SIZE {:?}, using default of {} MB",
                raw,
                DEFAULT_MAX_UPLOAD_MB
            );
            DEFAULT_MAX_UPLOAD_MB
        }
    }
}
