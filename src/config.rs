//! TOML configuration for the `xrx-monitors` shell.
//!
//! ```toml
//! display = ":0"
//! log_level = "debug"
//! live_updates = true
//! ```
//!
//! Every field is optional. A missing file means all defaults.

use std::{
    env,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct XrConfig {
    /// X display to connect to, `None` uses `$DISPLAY`
    pub display: Option<String>,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Follow screen change notifications from the server
    pub live_updates: bool,
}

impl Default for XrConfig {
    fn default() -> Self {
        Self {
            display: None,
            log_level: "info".to_string(),
            live_updates: true,
        }
    }
}

impl XrConfig {
    /// `$XDG_CONFIG_HOME/xrx-monitors/config.toml`, or under `~/.config`
    pub fn default_path() -> Option<PathBuf> {
        let base = env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("xrx-monitors").join("config.toml"))
    }

    /// Load the config at `path`, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(XrConfig::parse("").unwrap(), XrConfig::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config = XrConfig::parse("display = \":1\"\nlive_updates = false\n").unwrap();
        assert_eq!(config.display.as_deref(), Some(":1"));
        assert!(!config.live_updates);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn wrong_type_is_a_parse_error() {
        let err = XrConfig::parse("live_updates = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = env::temp_dir().join("xrx-monitors-no-such-dir/config.toml");
        assert_eq!(XrConfig::load(&path).unwrap(), XrConfig::default());
    }

    #[test]
    fn load_reads_an_existing_file() {
        let path = env::temp_dir().join(format!("xrx-monitors-{}.toml", std::process::id()));
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        let config = XrConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.unwrap().log_level, "debug");
    }
}
