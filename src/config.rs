// ABOUTME: Parses the optional TOML file holding connection defaults and tool paths
// ABOUTME: Command-line flags override anything loaded here

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of a `--config` file
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub firebird: FirebirdConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// Explicit client binary locations
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub isql: Option<PathBuf>,
    pub psql: Option<PathBuf>,
    pub sqlite3: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirebirdConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteConfig {
    pub database: Option<PathBuf>,
}

impl TransferConfig {
    /// Load the file when a path is given, otherwise return empty defaults
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let parsed: TransferConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse TOML config at {}", path.display()))?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(parsed)
    }
}

/// Pick the first value present: command line, then config file
pub fn pick<T>(flag: Option<T>, configured: Option<T>) -> Option<T> {
    flag.or(configured)
}

/// Resolve a required setting or fail naming the flag and config key
pub fn require<T>(value: Option<T>, flag: &str, config_key: &str) -> Result<T> {
    value.ok_or_else(|| {
        anyhow::anyhow!(
            "Missing required setting: pass {} or set {} in the config file",
            flag,
            config_key
        )
    })
}
