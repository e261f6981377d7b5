//! Filesystem helpers shared by the install strategies.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::exec::Executor;

/// Names never copied out of a worktree, at any depth.
const SKIPPED_NAMES: [&str; 2] = [".git", ".gitignore"];

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| SKIPPED_NAMES.contains(&n))
}

/// Ensure the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Mirror `src` into `dst` by hard-linking every file, falling back to a
/// byte copy when linking fails (for example across devices).
///
/// `.git` and `.gitignore` are skipped at every level. Symlinks inside `src`
/// are recreated as symlinks on Unix and copied elsewhere. Returns the
/// number of files written.
///
/// # Errors
///
/// Returns an error if `src` cannot be walked or a file cannot be placed.
pub fn link_or_copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    std::fs::create_dir_all(dst).with_context(|| format!("creating directory {}", dst.display()))?;
    let mut written = 0;

    for entry in WalkDir::new(src).into_iter().filter_entry(|e| !is_skipped(e)) {
        let entry = entry.with_context(|| format!("walking {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating directory {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            written += 1;
        } else {
            if std::fs::hard_link(entry.path(), &target).is_err() {
                std::fs::copy(entry.path(), &target).with_context(|| {
                    format!("copying {} to {}", entry.path().display(), target.display())
                })?;
            }
            written += 1;
        }
    }

    Ok(written)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = std::fs::read_link(src).with_context(|| format!("reading link {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("creating symlink {} -> {}", dst.display(), target.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    std::fs::copy(src, dst)
        .map(|_| ())
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))
}

/// Create a directory link at `link` pointing to `target`.
///
/// On Windows a native directory symlink is tried first, then a junction via
/// `cmd /c mklink /J`, which needs no special privilege.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
#[cfg_attr(unix, allow(unused_variables))]
pub fn create_dir_link(target: &Path, link: &Path, executor: &dyn Executor) -> Result<()> {
    ensure_parent_dir(link)?;

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!("creating symlink {} -> {}", link.display(), target.display())
        })?;
    }

    #[cfg(windows)]
    {
        if std::os::windows::fs::symlink_dir(target, link).is_err() {
            let cwd = link.parent().unwrap_or(link);
            let args = [
                "/c".to_string(),
                "mklink".to_string(),
                "/J".to_string(),
                link.to_string_lossy().into_owned(),
                target.to_string_lossy().into_owned(),
            ];
            executor
                .run_in(cwd, Path::new("cmd"), &args)
                .with_context(|| format!("creating junction {}", link.display()))?;
        }
    }

    Ok(())
}

/// Remove whatever is at `path`: a link (never followed), a file or a tree.
///
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    let result = if meta.file_type().is_symlink() || is_junction(&meta) {
        remove_link(path)
    } else if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.with_context(|| format!("removing {}", path.display()))
}

#[cfg(windows)]
fn remove_link(path: &Path) -> std::io::Result<()> {
    std::fs::remove_dir(path).or_else(|_| std::fs::remove_file(path))
}

#[cfg(not(windows))]
fn remove_link(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

#[cfg(windows)]
fn is_junction(meta: &std::fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt as _;
    const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
    meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0
}

#[cfg(not(windows))]
const fn is_junction(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Newest modification time of any file or directory under `dir`.
///
/// `.git` is not descended into. Returns `None` for an empty tree.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn newest_mtime(dir: &Path) -> Result<Option<SystemTime>> {
    let mut newest: Option<SystemTime> = None;
    for entry in WalkDir::new(dir).into_iter().filter_entry(|e| !is_skipped(e)) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let modified = entry
            .metadata()
            .with_context(|| format!("reading metadata: {}", entry.path().display()))?
            .modified()?;
        if newest.is_none_or(|n| modified > n) {
            newest = Some(modified);
        }
    }
    Ok(newest)
}

/// Write `content` to `path` unless the file already holds exactly those bytes.
///
/// Returns `true` when the file was written.
///
/// # Errors
///
/// Returns an error if the parent directory or the file cannot be written.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    if std::fs::read(path).is_ok_and(|existing| existing == content) {
        return Ok(false);
    }
    ensure_parent_dir(path)?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

/// Remove `dir` and its now-empty ancestors, stopping at `root`.
pub fn prune_empty_dirs(root: &Path, dir: &Path) {
    let mut current: Option<PathBuf> = Some(dir.to_path_buf());
    while let Some(d) = current {
        if d == root || !d.starts_with(root) {
            break;
        }
        // remove_dir only succeeds on an empty directory.
        if std::fs::remove_dir(&d).is_err() {
            break;
        }
        current = d.parent().map(Path::to_path_buf);
    }
}
