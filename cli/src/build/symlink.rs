//! Symlink strategy: install directories point back at the sources.
use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use std::path::Path;

use super::copy::{extract_tree, now_version, warn_head_drift};
use super::state::BuildRecord;
use super::{BuildContext, Strategy, fsutil, locked_rev, refresh_helptags};
use crate::config::lockjson::{ReposKind, Repository};
use crate::git::GitRepo;

/// Links worktrees and static directories into the install root. Bare
/// repositories have no worktree to link and are extracted instead.
///
/// The orchestrator always runs this strategy as a full rebuild.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymlinkStrategy;

impl Strategy for SymlinkStrategy {
    fn needs_sync(
        &self,
        _ctx: &BuildContext,
        _repo: &Repository,
        _prev: Option<&BuildRecord>,
    ) -> Result<bool> {
        Ok(true)
    }

    fn install(
        &self,
        ctx: &BuildContext,
        repo: &Repository,
        _prev: Option<&BuildRecord>,
    ) -> Result<BuildRecord> {
        let src = ctx.paths.full_repos_path(&repo.path);
        let dst = ctx.paths.install_path(&repo.path);

        let (version, files, dirty_worktree) = match repo.kind {
            ReposKind::Git => {
                let git = GitRepo::open(&src)?;
                if git.is_bare() {
                    let (version, files) = extract_tree(&git, locked_rev(repo), &dst, None)?;
                    refresh_helptags(ctx, repo, &dst);
                    (version, files, false)
                } else {
                    warn_head_drift(ctx, repo, &git);
                    let dirty = git.is_dirty()?;
                    link(ctx, &src, &dst)?;
                    refresh_helptags(ctx, repo, &src);
                    let version = git.head().unwrap_or_else(|| repo.version.clone());
                    (version, BTreeMap::new(), dirty)
                }
            }
            ReposKind::Static => {
                let version = now_version();
                link(ctx, &src, &dst)?;
                refresh_helptags(ctx, repo, &src);
                (version, BTreeMap::new(), false)
            }
        };

        Ok(BuildRecord {
            kind: repo.kind,
            path: repo.path.clone(),
            version,
            files,
            dirty_worktree,
        })
    }
}

fn link(ctx: &BuildContext, src: &Path, dst: &Path) -> Result<()> {
    let target = dunce::canonicalize(src)
        .with_context(|| format!("resolving source {}", src.display()))?;
    fsutil::remove_path(dst)?;
    fsutil::create_dir_link(&target, dst, ctx.executor.as_ref())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::build::test_helpers::Sandbox;
    use crate::config::BuildStrategy;
    use crate::git::test_helpers::{bare_repo, worktree_repo};
    use crate::paths::ReposPath;

    #[test]
    fn always_needs_sync() {
        let sandbox = Sandbox::new();
        let repo = Sandbox::repo(ReposKind::Static, "local/x", "");
        let ctx = sandbox.context(BuildStrategy::Symlink, vec![repo.clone()]);
        assert!(SymlinkStrategy.needs_sync(&ctx, &repo, None).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn worktree_is_linked() {
        let sandbox = Sandbox::new();
        let path = ReposPath::from("github.com/a/linked");
        let src = sandbox.paths.full_repos_path(&path);
        let commit = worktree_repo(&src, &[("plugin/l.vim", "x")]);
        let repo = Sandbox::repo(ReposKind::Git, path.as_str(), &commit);
        let ctx = sandbox.context(BuildStrategy::Symlink, vec![repo.clone()]);

        let rec = SymlinkStrategy.install(&ctx, &repo, None).unwrap();
        assert_eq!(rec.version, commit);
        assert!(rec.files.is_empty());
        let dst = ctx.paths.install_path(&path);
        assert!(std::fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
        assert_eq!(
            std::fs::read_link(&dst).unwrap(),
            dunce::canonicalize(&src).unwrap()
        );
        assert!(dst.join("plugin/l.vim").is_file());
    }

    #[test]
    fn bare_repo_falls_back_to_extraction() {
        let sandbox = Sandbox::new();
        let path = ReposPath::from("github.com/a/bare");
        let commit = bare_repo(
            &sandbox.paths.full_repos_path(&path),
            &[("plugin/b.vim", b"b", 0o100_644)],
        );
        let repo = Sandbox::repo(ReposKind::Git, path.as_str(), &commit);
        let ctx = sandbox.context(BuildStrategy::Symlink, vec![repo.clone()]);

        let rec = SymlinkStrategy.install(&ctx, &repo, None).unwrap();
        assert_eq!(rec.files.len(), 1);
        let dst = ctx.paths.install_path(&path);
        assert!(!std::fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read(dst.join("plugin/b.vim")).unwrap(), b"b");
    }

    #[cfg(unix)]
    #[test]
    fn static_repo_is_linked_with_timestamp_version() {
        let sandbox = Sandbox::new();
        let path = ReposPath::from("localhost/local/mine");
        let src = sandbox.paths.full_repos_path(&path);
        std::fs::create_dir_all(src.join("plugin")).unwrap();
        std::fs::write(src.join("plugin/m.vim"), "m").unwrap();
        let repo = Sandbox::repo(ReposKind::Static, path.as_str(), "");
        let ctx = sandbox.context(BuildStrategy::Symlink, vec![repo.clone()]);

        let rec = SymlinkStrategy.install(&ctx, &repo, None).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&rec.version).is_ok());
        let dst = ctx.paths.install_path(&path);
        assert!(std::fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
    }

    #[test]
    fn missing_source_fails() {
        let sandbox = Sandbox::new();
        let repo = Sandbox::repo(ReposKind::Static, "localhost/local/none", "");
        let ctx = sandbox.context(BuildStrategy::Symlink, vec![repo.clone()]);
        assert!(SymlinkStrategy.install(&ctx, &repo, None).is_err());
    }
}
