//! Install helpers shared by both strategies: profile rc files and helptags.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::fsutil;
use crate::error::RcFileError;
use crate::exec::Executor;
use crate::logging::Log;
use crate::paths::{PROFILE_GVIMRC, PROFILE_VIMRC, Paths};

/// First line of every rc file volt installs.
pub const RC_MARKER: &str =
    "\" NOTE: this file was generated by volt. please modify original file.";

/// One destination rc file and the profile file it comes from.
#[derive(Debug, Clone)]
struct RcFile {
    src: PathBuf,
    dst: PathBuf,
    rc_dir: PathBuf,
}

impl RcFile {
    /// A destination that exists without the marker was written by hand.
    fn is_foreign(&self) -> bool {
        self.dst.exists() && !has_marker(&self.dst)
    }

    /// Refuse to replace a hand-written destination with a profile file.
    fn check(&self) -> Result<(), RcFileError> {
        if self.is_foreign() && self.src.exists() {
            return Err(RcFileError::Conflict {
                dst: self.dst.clone(),
                rc_dir: self.rc_dir.clone(),
            });
        }
        Ok(())
    }

    fn install(&self) -> Result<(), RcFileError> {
        self.check()?;
        if self.is_foreign() {
            // Hand-written with no profile counterpart: leave it alone.
            return Ok(());
        }
        let io_err = |e: anyhow::Error| RcFileError::Io {
            dst: self.dst.clone(),
            reason: format!("{e:#}"),
        };

        if !self.src.exists() {
            return fsutil::remove_path(&self.dst).map_err(io_err);
        }

        let body = std::fs::read(&self.src)
            .with_context(|| format!("reading {}", self.src.display()))
            .map_err(io_err)?;
        let mut content = format!(
            "{RC_MARKER}\n\" original file: {}\n",
            self.src.display()
        )
        .into_bytes();
        content.extend_from_slice(&body);
        fsutil::write_if_changed(&self.dst, &content).map_err(io_err)?;
        Ok(())
    }
}

fn has_marker(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|c| c.lines().next().map(|l| l.trim_end() == RC_MARKER))
        .unwrap_or(false)
}

fn rc_pair(paths: &Paths, profile: &str) -> [RcFile; 2] {
    let rc_dir = paths.rc_dir(profile);
    [
        RcFile {
            src: rc_dir.join(PROFILE_VIMRC),
            dst: paths.vimrc(),
            rc_dir: rc_dir.clone(),
        },
        RcFile {
            src: rc_dir.join(PROFILE_GVIMRC),
            dst: paths.gvimrc(),
            rc_dir,
        },
    ]
}

/// Fail if either installed rc file would replace a hand-written one.
///
/// # Errors
///
/// Returns [`RcFileError::Conflict`] for the first conflicting file.
pub fn check_rc_files(paths: &Paths, profile: &str) -> Result<(), RcFileError> {
    rc_pair(paths, profile).iter().try_for_each(RcFile::check)
}

/// Install `vimrc` and `gvimrc` from the profile as a pair.
///
/// If `gvimrc` fails after `vimrc` was installed, `vimrc` is restored to its
/// previous content (or removed if it did not exist).
///
/// # Errors
///
/// Returns an error if either file conflicts with a hand-written file or
/// cannot be written.
pub fn install_rc_files(paths: &Paths, profile: &str) -> Result<(), RcFileError> {
    let [vimrc, gvimrc] = rc_pair(paths, profile);
    vimrc.check()?;
    gvimrc.check()?;

    let backup = std::fs::read(&vimrc.dst).ok();
    vimrc.install()?;

    if let Err(e) = gvimrc.install() {
        let restored = match &backup {
            Some(bytes) => std::fs::write(&vimrc.dst, bytes),
            None => std::fs::remove_file(&vimrc.dst).or_else(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(err)
                }
            }),
        };
        if let Err(restore_err) = restored {
            tracing::error!(
                "failed to restore {}: {restore_err}",
                vimrc.dst.display()
            );
        }
        return Err(e);
    }
    Ok(())
}

/// Arguments for a headless Vim that regenerates `doc/tags` in its working
/// directory. The path only reaches Vim through `getcwd()`, so it needs no
/// quoting.
#[must_use]
pub fn helptags_args() -> Vec<String> {
    [
        "-u",
        "NONE",
        "-i",
        "NONE",
        "-N",
        "-e",
        "-s",
        "--cmd",
        "execute 'set rtp+=' . fnameescape(getcwd())",
        "--cmd",
        "helptags doc",
        "--cmd",
        "quit!",
    ]
    .map(String::from)
    .to_vec()
}

/// Regenerate help tags for the plugin at `dir` if it has a `doc/` directory.
///
/// Returns `true` when Vim was invoked.
///
/// # Errors
///
/// Returns an error if Vim exits unsuccessfully.
pub fn generate_helptags(
    dir: &Path,
    vim: Option<&Path>,
    executor: &dyn Executor,
    log: &dyn Log,
) -> Result<bool> {
    if !dir.join("doc").is_dir() {
        return Ok(false);
    }
    let Some(vim) = vim else {
        log.debug(&format!("skipping helptags for {}: vim not found", dir.display()));
        return Ok(false);
    };
    executor
        .run_in(dir, vim, &helptags_args())
        .with_context(|| format!("generating helptags in {}", dir.display()))?;
    log.debug(&format!("generated helptags in {}", dir.display()));
    Ok(true)
}
