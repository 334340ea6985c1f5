//! Configuration file management for verdant.
//!
//! Reads an optional TOML file (default `verdant.toml`) and resolves every
//! setting through the chain: CLI flag > env var > config file > default.
//!
//! ```toml
//! [storage]
//! path = "farm.redb"
//! backend = "redb"      # or "memory"
//!
//! [logging]
//! format = "json"       # or "text"
//! filter = "verdant=debug"
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use verdant_core::VerdantError;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "verdant.toml";

/// Database file used when nothing else names one.
pub const DEFAULT_DATABASE_PATH: &str = "verdant.redb";

/// Log filter used when neither `RUST_LOG` nor the config file sets one.
pub const DEFAULT_LOG_FILTER: &str = "verdant=info,verdant_core=info";

pub const ENV_DATABASE: &str = "VERDANT_DB";
pub const ENV_LOG_FORMAT: &str = "VERDANT_LOG_FORMAT";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub path: Option<PathBuf>,
    pub backend: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub format: Option<String>,
    pub filter: Option<String>,
}

// -----------------------------------------------------------------------
// Setting enums
// -----------------------------------------------------------------------

/// Where plantations are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// ACID database file.
    #[default]
    Redb,
    /// Process-local store, discarded on exit. Write commands are refused.
    Memory,
}

impl FromStr for Backend {
    type Err = VerdantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(VerdantError::ConfigError(format!(
                "unknown backend '{}' (expected redb or memory)",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        })
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = VerdantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(VerdantError::ConfigError(format!(
                "unknown log format '{}' (expected text or json)",
                other
            ))),
        }
    }
}

// -----------------------------------------------------------------------
// Read
// -----------------------------------------------------------------------

/// Load and parse a config file.
///
/// A missing file is `Ok(None)`. An unreadable or malformed one is an error.
pub fn load_config(path: &Path) -> Result<Option<ConfigFile>, VerdantError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(VerdantError::IoError(format!(
                "failed to read config file at {}: {}",
                path.display(),
                e
            )));
        }
    };
    let config: ConfigFile = toml::from_str(&contents).map_err(|e| {
        VerdantError::ConfigError(format!(
            "failed to parse config file at {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(Some(config))
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line, if any.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub backend: Option<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdantConfig {
    pub database: PathBuf,
    pub backend: Backend,
    pub log_format: LogFormat,
    pub log_filter: String,
}

impl VerdantConfig {
    /// Resolve against the process environment and the config file on disk.
    pub fn resolve(cli: &CliOverrides) -> Result<Self, VerdantError> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = load_config(&path)?;
        Self::resolve_with(cli, |key| std::env::var(key).ok(), file)
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - Database: `--database` > `VERDANT_DB` > `storage.path` > `verdant.redb`
    /// - Backend: `--backend` > `storage.backend` > `redb`
    /// - Log format: `VERDANT_LOG_FORMAT` > `logging.format` > `text`
    /// - Log filter: `RUST_LOG` > `logging.filter` > [`DEFAULT_LOG_FILTER`]
    pub fn resolve_with(
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        file: Option<ConfigFile>,
    ) -> Result<Self, VerdantError> {
        let file = file.unwrap_or_default();
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let database = cli
            .database
            .clone()
            .or_else(|| non_empty(env(ENV_DATABASE)).map(PathBuf::from))
            .or(file.storage.path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let backend = match cli.backend.clone().or(file.storage.backend) {
            Some(label) => label.parse()?,
            None => Backend::default(),
        };

        let log_format = match non_empty(env(ENV_LOG_FORMAT)).or(file.logging.format) {
            Some(label) => label.parse()?,
            None => LogFormat::default(),
        };

        let log_filter = non_empty(env(ENV_LOG_FILTER))
            .or(file.logging.filter)
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database,
            backend,
            log_format,
            log_filter,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
