//! Configuration file management for mktplan.
//!
//! Provides a TOML-based config file at `~/.config/mktplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mktplan_data::config::DataConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub data: DataSection,
    pub server: ServerSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataSection {
    /// Path to the JSON snapshot file.
    pub file: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerSection {
    /// Listen address for `mktplan serve`.
    pub listen_addr: String,
}

/// Default listen address when nothing is configured.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7420";

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the mktplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/mktplan` or `~/.config/mktplan`.
/// We intentionally ignore the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS).
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("mktplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mktplan")
}

/// Return the path to the mktplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default snapshot path under the config directory.
pub fn default_data_file() -> PathBuf {
    config_dir().join("data.json")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct MktplanConfig {
    pub data_config: DataConfig,
    pub listen_addr: String,
}

impl MktplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// - Data file: `cli_data_file` > `MKTPLAN_DATA_FILE` env >
    ///   `config_file.data.file` > `<config dir>/data.json`
    /// - Listen address: `config_file.server.listen_addr` > default
    pub fn resolve(cli_data_file: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let data_file = if let Some(path) = cli_data_file {
            PathBuf::from(path)
        } else if let Some(path) = DataConfig::from_env().data_file {
            path
        } else if let Some(ref cfg) = file_config {
            PathBuf::from(&cfg.data.file)
        } else {
            default_data_file()
        };

        let listen_addr = file_config
            .as_ref()
            .map(|cfg| cfg.server.listen_addr.clone())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned());

        Ok(Self {
            data_config: DataConfig::new(data_file),
            listen_addr,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
