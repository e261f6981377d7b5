// Shared helpers for integration tests.
//
// Provides a temporary `$VOLTPATH` plus Vim directory and a fluent set of
// fixture writers (git repositories, static plugins, plugconf files,
// lock.json) so each test can set up an isolated environment without
// repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{IndexAddOption, Repository as GitRepository, Signature};
use volt_cli::build::BuildContext;
use volt_cli::config::BuildStrategy;
use volt_cli::config::lockjson::LockJson;
use volt_cli::exec::SystemExecutor;
use volt_cli::logging::Logger;
use volt_cli::paths::{Paths, ReposPath};

/// One `repos` entry of the generated lock.json.
#[derive(Debug, Clone)]
pub struct LockEntry {
    pub kind: &'static str,
    pub path: String,
    pub version: String,
}

/// An isolated volt environment backed by a [`tempfile::TempDir`].
pub struct VoltEnv {
    pub root: tempfile::TempDir,
    pub paths: Paths,
    pub logger: Arc<Logger>,
    entries: Vec<LockEntry>,
}

impl VoltEnv {
    /// Create an empty `$VOLTPATH` and Vim directory.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let paths = Paths::new(root.path().join("volt"), root.path().join("vim"));
        std::fs::create_dir_all(paths.volt_root()).expect("create volt dir");
        std::fs::create_dir_all(paths.vim_dir()).expect("create vim dir");
        Self {
            root,
            paths,
            logger: Arc::new(Logger::new()),
            entries: Vec::new(),
        }
    }

    /// Source directory of `repos`.
    pub fn source(&self, repos: &str) -> PathBuf {
        self.paths.full_repos_path(&ReposPath::from(repos))
    }

    /// Install directory of `repos`.
    pub fn installed(&self, repos: &str) -> PathBuf {
        self.paths.install_path(&ReposPath::from(repos))
    }

    /// Add a bare git plugin whose HEAD commit holds `files`
    /// (`(path, content, filemode)`) and lock it at that commit.
    pub fn bare_plugin(&mut self, repos: &str, files: &[(&str, &[u8], i32)]) -> String {
        let repo = GitRepository::init_bare(self.source(repos)).expect("init bare repo");
        let commit = commit_tree(&repo, files);
        self.lock(repos, "git", &commit);
        commit
    }

    /// Add a commit to an existing bare plugin and lock it there.
    pub fn bare_update(&mut self, repos: &str, files: &[(&str, &[u8], i32)]) -> String {
        let repo = GitRepository::open_bare(self.source(repos)).expect("open bare repo");
        let commit = commit_tree(&repo, files);
        self.lock(repos, "git", &commit);
        commit
    }

    /// Add a git plugin with a worktree holding `files`, all committed.
    pub fn worktree_plugin(&mut self, repos: &str, files: &[(&str, &str)]) -> String {
        let dir = self.source(repos);
        let repo = GitRepository::init(&dir).expect("init repo");
        for (rel, content) in files {
            let full = dir.join(rel);
            std::fs::create_dir_all(full.parent().expect("parent")).expect("create dir");
            std::fs::write(full, content).expect("write worktree file");
        }
        let mut index = repo.index().expect("index");
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .expect("add all");
        index.write().expect("write index");
        let tree = repo
            .find_tree(index.write_tree().expect("write tree"))
            .expect("find tree");
        let sig = Signature::now("volt", "volt@example.com").expect("signature");
        let commit = repo
            .commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .expect("commit")
            .to_string();
        self.lock(repos, "git", &commit);
        commit
    }

    /// Add a static plugin directory holding `files`.
    pub fn static_plugin(&mut self, repos: &str, files: &[(&str, &str)]) {
        let dir = self.source(repos);
        for (rel, content) in files {
            let full = dir.join(rel);
            std::fs::create_dir_all(full.parent().expect("parent")).expect("create dir");
            std::fs::write(full, content).expect("write static file");
        }
        self.lock(repos, "static", "");
    }

    /// Write the plugconf of `repos`.
    pub fn plugconf(&self, repos: &str, content: &str) {
        let path = self.paths.plugconf_path(&ReposPath::from(repos));
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create plugconf dir");
        std::fs::write(path, content).expect("write plugconf");
    }

    /// Write a profile rc file (`vimrc.vim` or `gvimrc.vim`).
    pub fn profile_rc(&self, file: &str, content: &str) {
        let dir = self.paths.rc_dir("default");
        std::fs::create_dir_all(&dir).expect("create rc dir");
        std::fs::write(dir.join(file), content).expect("write rc file");
    }

    /// Drop `repos` from the profile.
    pub fn unlock(&mut self, repos: &str) {
        self.entries.retain(|e| e.path != repos);
        self.write_lock_json();
    }

    fn lock(&mut self, repos: &str, kind: &'static str, version: &str) {
        let entry = LockEntry {
            kind,
            path: repos.to_string(),
            version: version.to_string(),
        };
        match self.entries.iter_mut().find(|e| e.path == repos) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.write_lock_json();
    }

    fn write_lock_json(&self) {
        let repos: Vec<_> = self
            .entries
            .iter()
            .map(|e| serde_json::json!({"type": e.kind, "path": e.path, "version": e.version}))
            .collect();
        let paths: Vec<_> = self.entries.iter().map(|e| e.path.clone()).collect();
        let lock = serde_json::json!({
            "version": 2,
            "current_profile_name": "default",
            "repos": repos,
            "profiles": [{"name": "default", "repos_path": paths}],
        });
        std::fs::write(
            self.paths.lock_json(),
            serde_json::to_string_pretty(&lock).expect("serialize lock.json"),
        )
        .expect("write lock.json");
    }

    /// Build context for the current lock.json, read back the way the
    /// command does.
    pub fn context(&self, strategy: BuildStrategy) -> BuildContext {
        let profile = LockJson::read(&self.paths.lock_json())
            .expect("read lock.json")
            .active_profile()
            .expect("active profile");
        BuildContext {
            paths: self.paths.clone(),
            strategy,
            profile,
            vim: None,
            log: self.logger.clone(),
            executor: Arc::new(SystemExecutor),
        }
    }

    /// Contents of the generated bundle.
    pub fn bundle(&self) -> String {
        std::fs::read_to_string(self.paths.bundle_path()).expect("read bundle")
    }
}

fn commit_tree(repo: &GitRepository, files: &[(&str, &[u8], i32)]) -> String {
    let tree_oid = build_tree(repo, files, "");
    let tree = repo.find_tree(tree_oid).expect("find tree");
    let sig = Signature::now("volt", "volt@example.com").expect("signature");
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parents)
        .expect("commit")
        .to_string()
}

fn build_tree(repo: &GitRepository, files: &[(&str, &[u8], i32)], prefix: &str) -> git2::Oid {
    let mut builder = repo.treebuilder(None).expect("treebuilder");
    let mut subdirs: Vec<&str> = Vec::new();
    for (path, content, mode) in files {
        let Some(rest) = path.strip_prefix(prefix) else {
            continue;
        };
        match rest.split_once('/') {
            Some((dir, _)) => {
                if !subdirs.contains(&dir) {
                    subdirs.push(dir);
                }
            }
            None => {
                let blob = repo.blob(content).expect("blob");
                builder.insert(rest, blob, *mode).expect("insert blob");
            }
        }
    }
    for dir in subdirs {
        let sub = build_tree(repo, files, &format!("{prefix}{dir}/"));
        builder.insert(dir, sub, 0o040_000).expect("insert tree");
    }
    builder.write().expect("write tree")
}

/// Modification time of `path`.
pub fn mtime(path: &Path) -> std::time::SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .expect("read mtime")
}
