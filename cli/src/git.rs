//! git2-backed view of a plugin repository.
//!
//! Only what the build needs: open, bare detection, commit/tree resolution,
//! tree enumeration with file modes, blob content, HEAD and worktree status.
use anyhow::{Context as _, Result, bail};
use git2::{ObjectType, Oid, Repository, Status, StatusOptions};
use std::path::Path;

/// How a blob is materialised on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
}

impl FileMode {
    fn from_filemode(mode: i32) -> Self {
        match mode {
            0o100_755 => Self::Executable,
            0o120_000 => Self::Symlink,
            _ => Self::Regular,
        }
    }
}

/// One blob reachable from a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// `/`-separated path relative to the tree root.
    pub path: String,
    pub oid: Oid,
    pub mode: FileMode,
}

/// An opened repository.
pub struct GitRepo {
    repo: Repository,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl GitRepo {
    /// Open the repository at `path` (bare or with a worktree).
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a git repository.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)
            .with_context(|| format!("failed to open git repository {}", path.display()))?;
        Ok(Self { repo })
    }

    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.repo.is_bare()
    }

    /// Commit id HEAD points at, if HEAD is born.
    #[must_use]
    pub fn head(&self) -> Option<String> {
        self.repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| oid.to_string())
    }

    /// `true` when tracked files in the worktree or index differ from HEAD.
    ///
    /// Untracked and ignored files do not count. A bare repository is never dirty.
    ///
    /// # Errors
    ///
    /// Returns an error if the status scan fails.
    pub fn is_dirty(&self) -> Result<bool> {
        if self.is_bare() {
            return Ok(false);
        }
        let mut opts = StatusOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .context("failed to read worktree status")?;
        Ok(statuses
            .iter()
            .any(|s| s.status() != Status::CURRENT && !s.status().contains(Status::IGNORED)))
    }

    /// Resolve `rev` (a commit hash or any revspec) to a commit id.
    ///
    /// # Errors
    ///
    /// Returns an error if `rev` does not name a commit.
    pub fn resolve_commit(&self, rev: &str) -> Result<Oid> {
        Ok(self.commit(rev)?.id())
    }

    /// Resolve `rev` to the id of its root tree.
    ///
    /// # Errors
    ///
    /// Returns an error if `rev` does not name a commit.
    pub fn resolve_tree(&self, rev: &str) -> Result<Oid> {
        Ok(self.commit(rev)?.tree_id())
    }

    fn commit(&self, rev: &str) -> Result<git2::Commit<'_>> {
        self.repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .with_context(|| format!("failed to resolve commit '{rev}'"))
    }

    /// Every blob reachable from the tree of `rev`.
    ///
    /// Submodule entries are skipped. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if `rev` cannot be resolved, a subtree is missing or
    /// an entry name is not valid UTF-8.
    pub fn tree_files(&self, rev: &str) -> Result<Vec<TreeFile>> {
        let root = self.repo.find_tree(self.resolve_tree(rev)?)?;
        let mut files = Vec::new();
        let mut stack = vec![(root, String::new())];

        while let Some((tree, prefix)) = stack.pop() {
            for entry in &tree {
                let Some(name) = entry.name() else {
                    bail!("non UTF-8 file name under '{prefix}'");
                };
                let path = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}/{name}")
                };
                match entry.kind() {
                    Some(ObjectType::Tree) => {
                        let subtree = self
                            .repo
                            .find_tree(entry.id())
                            .with_context(|| format!("missing tree object for '{path}'"))?;
                        stack.push((subtree, path));
                    }
                    Some(ObjectType::Blob) => files.push(TreeFile {
                        path,
                        oid: entry.id(),
                        mode: FileMode::from_filemode(entry.filemode()),
                    }),
                    _ => {}
                }
            }
        }

        Ok(files)
    }

    /// Raw content of a blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob does not exist.
    pub fn blob_content(&self, oid: Oid) -> Result<Vec<u8>> {
        let blob = self
            .repo
            .find_blob(oid)
            .with_context(|| format!("missing blob {oid}"))?;
        Ok(blob.content().to_vec())
    }
}
