//! Readers for the two inputs the build engine consumes from `$VOLTPATH`:
//! `config.toml` ([`Config`]) and `lock.json` ([`lockjson`]).
pub mod lockjson;
pub mod toml_loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// How repositories are installed into the Vim package directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// Link each install directory to the source repository.
    #[default]
    Symlink,
    /// Extract (or hard-link) files into each install directory.
    Copy,
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symlink => f.write_str("symlink"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

/// `[build]` section of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub strategy: BuildStrategy,
}

/// Parsed `config.toml`. Sections used by other commands are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
}

impl Config {
    /// Load `config.toml`, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        toml_loader::load_config(path)
    }
}
