//! Copy strategy: every repository gets a real directory under the install root.
use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use super::state::BuildRecord;
use super::{BuildContext, Strategy, fsutil, locked_rev, refresh_helptags};
use crate::config::lockjson::{ReposKind, Repository};
use crate::git::{FileMode, GitRepo, TreeFile};

/// Installs repositories by tree extraction (git) or hard-link/copy (static
/// and dirty worktrees), resyncing only what changed since the last build.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyStrategy;

impl Strategy for CopyStrategy {
    fn needs_sync(
        &self,
        ctx: &BuildContext,
        repo: &Repository,
        prev: Option<&BuildRecord>,
    ) -> Result<bool> {
        let Some(prev) = prev else {
            return Ok(true);
        };
        if prev.kind != repo.kind
            || prev.dirty_worktree
            || !ctx.paths.install_path(&repo.path).is_dir()
        {
            return Ok(true);
        }
        let src = ctx.paths.full_repos_path(&repo.path);
        match repo.kind {
            ReposKind::Git => {
                let git = GitRepo::open(&src)?;
                if git.is_dirty()? {
                    return Ok(true);
                }
                let commit = git.resolve_commit(locked_rev(repo))?;
                Ok(commit.to_string() != prev.version)
            }
            ReposKind::Static => static_changed(&src, &prev.version),
        }
    }

    fn install(
        &self,
        ctx: &BuildContext,
        repo: &Repository,
        prev: Option<&BuildRecord>,
    ) -> Result<BuildRecord> {
        let src = ctx.paths.full_repos_path(&repo.path);
        let dst = ctx.paths.install_path(&repo.path);
        let record = match repo.kind {
            ReposKind::Git => install_git(ctx, repo, &src, &dst, prev)?,
            ReposKind::Static => {
                let version = now_version();
                fsutil::remove_path(&dst)?;
                fsutil::link_or_copy_tree(&src, &dst)?;
                record(repo, version, BTreeMap::new(), false)
            }
        };

        // A linked tags file would be rewritten through into the source.
        let tags = dst.join("doc").join("tags");
        if ctx.vim.is_some() && tags.is_file() {
            fsutil::remove_path(&tags)?;
        }
        refresh_helptags(ctx, repo, &dst);
        Ok(record)
    }
}

fn install_git(
    ctx: &BuildContext,
    repo: &Repository,
    src: &Path,
    dst: &Path,
    prev: Option<&BuildRecord>,
) -> Result<BuildRecord> {
    let git = GitRepo::open(src)?;
    if git.is_dirty()? {
        warn_head_drift(ctx, repo, &git);
        ctx.log.debug(&format!("{}: worktree is dirty, copying files", repo.path));
        fsutil::remove_path(dst)?;
        fsutil::link_or_copy_tree(src, dst)?;
        let version = git.head().unwrap_or_else(|| repo.version.clone());
        return Ok(record(repo, version, BTreeMap::new(), true));
    }

    let prev_files = prev
        .filter(|p| {
            p.kind == ReposKind::Git && !p.dirty_worktree && !p.files.is_empty() && dst.is_dir()
        })
        .map(|p| &p.files);
    let (version, files) = extract_tree(&git, locked_rev(repo), dst, prev_files)?;
    Ok(record(repo, version, files, false))
}

fn record(
    repo: &Repository,
    version: String,
    files: BTreeMap<String, String>,
    dirty_worktree: bool,
) -> BuildRecord {
    BuildRecord {
        kind: repo.kind,
        path: repo.path.clone(),
        version,
        files,
        dirty_worktree,
    }
}

/// Write the tree of `rev` into `dst` and return the commit id and the
/// path-to-blob map of what is now on disk.
///
/// With `prev`, only blobs whose id or mode changed (or whose file went
/// missing) are written, and files absent from the new tree are deleted. Without it, `dst`
/// is recreated from scratch.
pub(super) fn extract_tree(
    git: &GitRepo,
    rev: &str,
    dst: &Path,
    prev: Option<&BTreeMap<String, String>>,
) -> Result<(String, BTreeMap<String, String>)> {
    let commit = git.resolve_commit(rev)?;
    let entries = git.tree_files(rev)?;
    let mut files = BTreeMap::new();

    match prev {
        Some(prev) => {
            let current: HashSet<&str> = entries.iter().map(|f| f.path.as_str()).collect();
            for gone in prev.keys().filter(|p| !current.contains(p.as_str())) {
                let target = join_rel(dst, gone)?;
                fsutil::remove_path(&target)?;
                if let Some(parent) = target.parent() {
                    fsutil::prune_empty_dirs(dst, parent);
                }
            }
        }
        None => {
            fsutil::remove_path(dst)?;
        }
    }
    std::fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;

    for entry in &entries {
        let oid = entry.oid.to_string();
        let target = join_rel(dst, &entry.path)?;
        let unchanged = prev.and_then(|p| p.get(&entry.path)).is_some_and(|old| *old == oid)
            && std::fs::symlink_metadata(&target)
                .is_ok_and(|meta| mode_matches(entry.mode, &meta));
        if !unchanged {
            write_blob(git, entry, &target)?;
        }
        files.insert(entry.path.clone(), oid);
    }

    Ok((commit.to_string(), files))
}

/// Append a `/`-separated tree path to `base`, refusing components that
/// would escape it.
fn join_rel(base: &Path, rel: &str) -> Result<PathBuf> {
    let mut out = base.to_path_buf();
    for part in rel.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            bail!("refusing tree path '{rel}'");
        }
        out.push(part);
    }
    Ok(out)
}

fn write_blob(git: &GitRepo, entry: &TreeFile, target: &Path) -> Result<()> {
    let content = git.blob_content(entry.oid)?;
    fsutil::ensure_parent_dir(target)?;
    fsutil::remove_path(target)?;

    if entry.mode == FileMode::Symlink {
        return write_symlink(&content, target);
    }
    std::fs::write(target, &content).with_context(|| format!("writing {}", target.display()))?;
    if entry.mode == FileMode::Executable {
        set_executable(target)?;
    }
    Ok(())
}

/// Whether the file on disk already has the type and permissions `mode` asks for.
#[cfg(unix)]
fn mode_matches(mode: FileMode, meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    let executable = meta.permissions().mode() & 0o111 != 0;
    match mode {
        FileMode::Symlink => meta.file_type().is_symlink(),
        FileMode::Executable => meta.is_file() && executable,
        FileMode::Regular => meta.is_file() && !executable,
    }
}

// Links are kept as plain files and there is no executable bit.
#[cfg(not(unix))]
fn mode_matches(_mode: FileMode, meta: &std::fs::Metadata) -> bool {
    meta.is_file()
}

#[cfg(unix)]
fn write_symlink(content: &[u8], target: &Path) -> Result<()> {
    use std::os::unix::ffi::OsStrExt as _;
    let link = std::ffi::OsStr::from_bytes(content);
    std::os::unix::fs::symlink(link, target)
        .with_context(|| format!("creating symlink {}", target.display()))
}

// Symlinks usually need privileges on Windows; keep the link text as a file.
#[cfg(not(unix))]
fn write_symlink(content: &[u8], target: &Path) -> Result<()> {
    std::fs::write(target, content).with_context(|| format!("writing {}", target.display()))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Install timestamp recorded as the version of a static repository.
pub(super) fn now_version() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// A static repository is stale when anything under it is newer than the
/// recorded install time, or the recorded time is unreadable.
fn static_changed(src: &Path, recorded: &str) -> Result<bool> {
    let Ok(installed) = DateTime::parse_from_rfc3339(recorded) else {
        return Ok(true);
    };
    let newest = fsutil::newest_mtime(src)?;
    Ok(newest.is_some_and(|t| DateTime::<Utc>::from(t) > installed.with_timezone(&Utc)))
}

/// Warn when a worktree is installed as-is but HEAD is not the locked commit.
pub(super) fn warn_head_drift(ctx: &BuildContext, repo: &Repository, git: &GitRepo) {
    if repo.version.is_empty() {
        return;
    }
    if let Some(head) = git.head()
        && head != repo.version
    {
        ctx.log.warn(&format!(
            "{}: HEAD is at {head} but lock.json pins {}; installing the worktree as is",
            repo.path, repo.version
        ));
    }
}
