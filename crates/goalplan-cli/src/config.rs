//! Configuration file management for goalplan.
//!
//! Provides a TOML-based config file at `~/.config/goalplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use goalplan_core::completion::CompletionConfig;
use goalplan_db::config::DbConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the goalplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/goalplan` or `~/.config/goalplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("goalplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("goalplan")
}

/// Return the path to the goalplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file to `path`, creating parent dirs as
/// needed. Sets file permissions to 0600 on Unix, since the file may hold an
/// API key.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct GoalplanConfig {
    pub db_config: DbConfig,
    pub completion: CompletionConfig,
}

impl GoalplanConfig {
    /// Resolve configuration from the default config file location.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        Self::resolve_with(cli_db_url, &config_path())
    }

    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `GOALPLAN_DATABASE_URL` env > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Completion: the `[completion]` table, or defaults when absent. The API
    ///   key itself is resolved lazily, when a provider is built.
    ///
    /// A missing config file is not an error; an unreadable or invalid one is.
    pub fn resolve_with(cli_db_url: Option<&str>, path: &Path) -> Result<Self> {
        let file_config = if path.exists() {
            Some(load_config_from(path)?)
        } else {
            None
        };

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let completion = file_config
            .map(|cfg| cfg.completion)
            .unwrap_or_default();

        Ok(Self {
            db_config: DbConfig::new(db_url),
            completion,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
