//! Read-only view of `$VOLTPATH/lock.json`.
//!
//! `lock.json` is owned by the commands that fetch and pin repositories; the
//! build engine only needs the active profile's repositories in profile
//! order, each with its locked version.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::LockJsonError;
use crate::paths::ReposPath;

/// Name of the profile that always exists.
pub const DEFAULT_PROFILE: &str = "default";

/// How a repository's files are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReposKind {
    /// A git clone (bare or with a worktree), pinned to a commit.
    Git,
    /// A plain directory imported as-is.
    Static,
}

/// One repository to install: identity, kind and locked version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(rename = "type")]
    pub kind: ReposKind,
    pub path: ReposPath,
    /// Commit hash for git; opaque for static.
    #[serde(default)]
    pub version: String,
}

/// A named subset of repositories.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LockProfile {
    pub name: String,
    #[serde(default)]
    pub repos_path: Vec<ReposPath>,
}

/// Parsed `lock.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LockJson {
    #[serde(default)]
    pub version: i64,
    #[serde(default = "default_profile_name")]
    pub current_profile_name: String,
    #[serde(default)]
    pub repos: Vec<Repository>,
    #[serde(default)]
    pub profiles: Vec<LockProfile>,
}

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Default for LockJson {
    fn default() -> Self {
        Self {
            version: 0,
            current_profile_name: default_profile_name(),
            repos: Vec::new(),
            profiles: vec![LockProfile {
                name: default_profile_name(),
                repos_path: Vec::new(),
            }],
        }
    }
}

/// The active profile resolved against the repository list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveProfile {
    pub name: String,
    /// Repositories in the order the profile lists them.
    pub repos: Vec<Repository>,
}

impl LockJson {
    /// Read `lock.json`. A missing file is an empty lock with the default profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, LockJsonError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| LockJsonError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| LockJsonError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the current profile into concrete repositories.
    ///
    /// # Errors
    ///
    /// Returns an error if the current profile is undefined, lists a
    /// repository that has no entry in `repos`, or lists a path that would
    /// resolve outside the volt directories.
    pub fn active_profile(&self) -> Result<ActiveProfile, LockJsonError> {
        let name = &self.current_profile_name;
        let profile = match self.profiles.iter().find(|p| &p.name == name) {
            Some(p) => p,
            None if name == DEFAULT_PROFILE && self.profiles.is_empty() => {
                return Ok(ActiveProfile {
                    name: name.clone(),
                    repos: Vec::new(),
                });
            }
            None => return Err(LockJsonError::UnknownProfile(name.clone())),
        };

        let repos = profile
            .repos_path
            .iter()
            .map(|path| {
                if !path.is_contained() {
                    return Err(LockJsonError::InvalidReposPath(path.to_string()));
                }
                self.repos
                    .iter()
                    .find(|r| &r.path == path)
                    .cloned()
                    .ok_or_else(|| LockJsonError::MissingRepos {
                        profile: name.clone(),
                        repos: path.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ActiveProfile {
            name: name.clone(),
            repos,
        })
    }
}
