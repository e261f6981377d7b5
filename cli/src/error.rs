//! Domain-specific error types for the volt build engine.
//!
//! Internal modules return the typed errors below. The `build` command
//! converts them to [`anyhow::Error`] at the CLI boundary with `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! BuildError
//! ├── RcFile(RcFileError)        — hand-edited vimrc/gvimrc in the way (fatal)
//! ├── State(StateError)          — build-info.json could not be written
//! ├── Failures(BuildFailures)    — aggregated per-repository failures
//! │   ├── Sync(SyncError)        — install/remove of one repository
//! │   └── Plugconf(PlugconfError)— one plugconf failed to parse
//! └── Other(anyhow::Error)       — install root / bundle I/O
//! ```
//!
//! `StateError` is also produced while *reading* the build state, where the
//! orchestrator demotes it to "no previous state" and forces a full rebuild.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by [`crate::build::build`].
#[derive(Error, Debug)]
pub enum BuildError {
    /// An rc file would overwrite a file volt did not generate.
    #[error(transparent)]
    RcFile(#[from] RcFileError),

    /// The build state could not be persisted.
    #[error("failed to save build state: {0}")]
    State(#[from] StateError),

    /// One or more repositories or plugconf files failed.
    #[error(transparent)]
    Failures(#[from] BuildFailures),

    /// Any other I/O failure while preparing the install root or bundle.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure to install or remove a single repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Installing (copying, extracting or linking) a repository failed.
    #[error("failed to install {path}: {reason}")]
    Install {
        /// Repository path (`host/user/name`).
        path: String,
        /// Human-readable reason, including the error chain.
        reason: String,
    },

    /// Removing a repository that is no longer in the profile failed.
    #[error("failed to remove {name}: {reason}")]
    Remove {
        /// Directory name under the install root.
        name: String,
        /// Human-readable reason, including the error chain.
        reason: String,
    },
}

impl SyncError {
    /// Wrap an install failure with the repository path it belongs to.
    pub fn install(path: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Install {
            path: path.into(),
            reason: format!("{err:#}"),
        }
    }

    /// Wrap a removal failure with the directory it belongs to.
    pub fn remove(name: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Remove {
            name: name.into(),
            reason: format!("{err:#}"),
        }
    }
}

/// Failure to read or parse a plugconf file.
#[derive(Error, Debug)]
pub enum PlugconfError {
    /// The plugconf file exists but could not be read.
    #[error("{}: failed to read plugconf: {source}", .path.display())]
    Read {
        /// Path of the plugconf file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The plugconf file is not a valid plugconf script.
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        /// Path of the plugconf file.
        path: PathBuf,
        /// 1-based line number where the problem was found.
        line: usize,
        /// What is wrong.
        message: String,
    },
}

/// Failure to install `~/.vim/vimrc` or `~/.vim/gvimrc`.
#[derive(Error, Debug)]
pub enum RcFileError {
    /// The destination was written by hand and a profile rc file would replace it.
    #[error(
        "'{}' is not an auto-generated file. please move it to '{}' and re-run 'volt build'",
        .dst.display(),
        .rc_dir.display()
    )]
    Conflict {
        /// Destination rc file.
        dst: PathBuf,
        /// Profile rc directory the user should move the file into.
        rc_dir: PathBuf,
    },

    /// Reading, writing or removing an rc file failed.
    #[error("failed to install {}: {reason}", .dst.display())]
    Io {
        /// Destination rc file.
        dst: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
}

/// Failure to load or save `build-info.json`.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The state file is not valid JSON for the expected schema.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The state file was written by an incompatible version.
    #[error("unsupported schema version {found} (expected {expected})")]
    SchemaMismatch {
        /// Version found on disk.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// Two records share the same repository path.
    #[error("duplicate repository '{0}' in build state")]
    DuplicateRepos(String),

    /// Serializing the state failed.
    #[error("failed to serialize build state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Writing the state file failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Failure to read `lock.json`.
#[derive(Error, Debug)]
pub enum LockJsonError {
    /// `lock.json` could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path of `lock.json`.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// `lock.json` is not valid JSON.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Path of `lock.json`.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The current profile is not defined.
    #[error("profile '{0}' does not exist in lock.json")]
    UnknownProfile(String),

    /// A repository path has `.`/`..` components or is empty.
    #[error("repository path '{0}' in lock.json escapes the repos directory")]
    InvalidReposPath(String),

    /// A profile lists a repository that has no entry in `repos`.
    #[error("profile '{profile}' refers to '{repos}' which is not in lock.json")]
    MissingRepos {
        /// Profile name.
        profile: String,
        /// Repository path listed by the profile.
        repos: String,
    },
}

/// Failure to read `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `config.toml` exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path of `config.toml`.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// `config.toml` is not valid TOML for the expected schema.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Path of `config.toml`.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Failure to take the transaction lock.
#[derive(Error, Debug)]
pub enum TrxError {
    /// Another volt process holds the lock.
    #[error(
        "another volt process is running: {command} (PID {pid})\n\
         If you're sure no volt process is running, remove the lock file:\n  {}",
        .lock_path.display()
    )]
    Locked {
        /// Command recorded by the lock holder.
        command: String,
        /// PID recorded by the lock holder.
        pid: u32,
        /// Path of the lock file.
        lock_path: PathBuf,
    },

    /// The lock is held but its metadata is unreadable.
    #[error(
        "another volt process is running\n\
         If you're sure no volt process is running, remove the lock file:\n  {}",
        .lock_path.display()
    )]
    LockedUnknown {
        /// Path of the lock file.
        lock_path: PathBuf,
    },

    /// The lock file could not be created.
    #[error("failed to create lock file {}: {source}", .lock_path.display())]
    Io {
        /// Path of the lock file.
        lock_path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// A single collected failure.
#[derive(Error, Debug)]
pub enum BuildFailure {
    /// A repository failed to install or be removed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A plugconf failed to parse.
    #[error(transparent)]
    Plugconf(#[from] PlugconfError),
}

/// Every failure collected during one build, reported together.
#[derive(Debug, Default)]
pub struct BuildFailures(pub Vec<BuildFailure>);

impl BuildFailures {
    /// Return `true` when nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of collected failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Record one more failure.
    pub fn push(&mut self, failure: impl Into<BuildFailure>) {
        self.0.push(failure.into());
    }

    /// Return `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one failure was collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for BuildFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred during build:", self.0.len())?;
        for failure in &self.0 {
            write!(f, "\n  * {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailures {}
