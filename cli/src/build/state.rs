//! Persisted build state (`build-info.json`).
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::config::BuildStrategy;
use crate::config::lockjson::ReposKind;
use crate::error::StateError;
use crate::paths::ReposPath;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 2;

/// What was installed for one repository on the last build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub kind: ReposKind,
    pub path: ReposPath,
    /// Commit for git, install timestamp for static.
    pub version: String,
    /// Relative path to blob id. Only filled by tree extraction.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub dirty_worktree: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaHeader {
    #[serde(default)]
    schema_version: u32,
}

/// Everything `build-info.json` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildState {
    pub schema_version: u32,
    pub strategy: BuildStrategy,
    #[serde(default)]
    pub repos: Vec<BuildRecord>,
}

impl BuildState {
    #[must_use]
    pub const fn new(strategy: BuildStrategy) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            strategy,
            repos: Vec::new(),
        }
    }

    /// Read the state file. `Ok(None)` means no build has run yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, from another
    /// schema version, or holds the same repository twice.
    pub fn read(path: &Path) -> Result<Option<Self>, StateError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        // Version first, so an old layout reports a mismatch rather than a field error.
        let header: SchemaHeader = serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if header.schema_version != SCHEMA_VERSION {
            return Err(StateError::SchemaMismatch {
                found: header.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let state: Self = serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        state.validate()?;
        Ok(Some(state))
    }

    fn validate(&self) -> Result<(), StateError> {
        let mut seen = HashSet::new();
        for record in &self.repos {
            if !seen.insert(&record.path) {
                return Err(StateError::DuplicateRepos(record.path.to_string()));
            }
        }
        Ok(())
    }

    /// Write the state atomically (temp file then rename).
    ///
    /// Identical content on disk is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn write(&self, path: &Path) -> Result<(), StateError> {
        self.validate()?;
        let mut json = serde_json::to_string_pretty(self).map_err(StateError::Serialize)?;
        json.push('\n');

        if std::fs::read(path).is_ok_and(|existing| existing == json.as_bytes()) {
            return Ok(());
        }

        let write_err = |source| StateError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)
    }

    /// O(1) lookup of records by repository path.
    #[must_use]
    pub fn by_path(&self) -> HashMap<ReposPath, BuildRecord> {
        self.repos
            .iter()
            .map(|r| (r.path.clone(), r.clone()))
            .collect()
    }
}
