//! Build orchestration: reconcile the active profile with the install root.
//!
//! 1. Read `build-info.json` and decide between a full and an incremental
//!    build.
//! 2. Sync every repository that changed and remove directories no longer in
//!    the profile, concurrently (see [`fanout`]).
//! 3. Install the profile's `vimrc`/`gvimrc` and regenerate the plugconf
//!    bundle.
//! 4. Persist the new state if anything changed.
pub mod base;
pub mod copy;
pub mod fanout;
pub mod fsutil;
pub mod state;
pub mod symlink;

use anyhow::{Context as _, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BuildStrategy;
use crate::config::lockjson::{ActiveProfile, Repository};
use crate::error::{BuildError, BuildFailures, SyncError};
use crate::exec::Executor;
use crate::logging::{Log, RepoStatus};
use crate::paths::{Paths, ReposPath};
use crate::plugconf;

use state::{BuildRecord, BuildState};

/// Everything one build needs, passed explicitly through every step.
pub struct BuildContext {
    pub paths: Paths,
    /// Configured install strategy.
    pub strategy: BuildStrategy,
    pub profile: ActiveProfile,
    /// Vim binary for helptags; `None` skips them.
    pub vim: Option<PathBuf>,
    pub log: Arc<dyn Log>,
    pub executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("paths", &self.paths)
            .field("strategy", &self.strategy)
            .field("profile", &self.profile.name)
            .field("vim", &self.vim)
            .field("log", &"<dyn Log>")
            .field("executor", &self.executor)
            .finish()
    }
}

/// Counts of what a successful build did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// The install root was wiped and rebuilt.
    pub full: bool,
}

impl BuildReport {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.added + self.updated + self.removed > 0
    }
}

/// Install mechanism for one repository.
pub trait Strategy: Sync {
    /// Whether `repo` must be reinstalled given its previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be inspected.
    fn needs_sync(
        &self,
        ctx: &BuildContext,
        repo: &Repository,
        prev: Option<&BuildRecord>,
    ) -> Result<bool>;

    /// Install `repo` into its install path and return the record to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if any filesystem or git step fails.
    fn install(
        &self,
        ctx: &BuildContext,
        repo: &Repository,
        prev: Option<&BuildRecord>,
    ) -> Result<BuildRecord>;
}

/// Run a build.
///
/// `full` wipes the install root first. A full build is also forced when the
/// saved state is unusable, was written by the other strategy, or the
/// strategy is symlink.
///
/// # Errors
///
/// Returns [`BuildError::RcFile`] if a hand-written rc file is in the way,
/// [`BuildError::Failures`] if any repository or plugconf failed, and
/// [`BuildError::State`] if the state cannot be saved.
pub fn build(ctx: &BuildContext, full: bool) -> Result<BuildReport, BuildError> {
    let log = ctx.log.as_ref();
    let state_path = ctx.paths.build_info();
    let (previous, full) = decide_full(ctx, &state_path, full);

    let prev_map: HashMap<ReposPath, BuildRecord> = if full {
        HashMap::new()
    } else {
        previous.as_ref().map(BuildState::by_path).unwrap_or_default()
    };
    let known: HashSet<ReposPath> = previous
        .as_ref()
        .map(|s| s.repos.iter().map(|r| r.path.clone()).collect())
        .unwrap_or_default();

    base::check_rc_files(&ctx.paths, &ctx.profile.name)?;

    let install_root = ctx.paths.install_root();
    if full {
        log.debug(&format!("removing {}", install_root.display()));
        fsutil::remove_path(&install_root)?;
    }
    std::fs::create_dir_all(&install_root)
        .with_context(|| format!("creating {}", install_root.display()))?;

    log.stage(&format!(
        "Installing {} repositories ({} strategy)",
        ctx.profile.repos.len(),
        ctx.strategy
    ));
    let strategy: &dyn Strategy = match ctx.strategy {
        BuildStrategy::Copy => &copy::CopyStrategy,
        BuildStrategy::Symlink => &symlink::SymlinkStrategy,
    };
    let mut pass = sync_repos(ctx, strategy, &prev_map, &known);
    pass.report.full = full;

    log.stage("Installing vimrc and gvimrc");
    let rc_result = base::install_rc_files(&ctx.paths, &ctx.profile.name);

    log.stage("Generating plugconf bundle");
    let installed: Vec<Repository> = ctx
        .profile
        .repos
        .iter()
        .filter(|r| pass.records.iter().any(|rec| rec.path == r.path))
        .cloned()
        .collect();
    let bundle = plugconf::write_bundle(&ctx.paths, &installed, log)?;
    for e in bundle.errors {
        pass.failures.push(e);
    }

    let new_state = BuildState {
        repos: pass.records,
        ..BuildState::new(ctx.strategy)
    };
    if full || pass.report.changed() || previous.as_ref() != Some(&new_state) {
        new_state.write(&state_path)?;
        log.debug(&format!("saved {}", state_path.display()));
    }

    rc_result?;
    pass.failures.into_result()?;
    Ok(pass.report)
}

/// Load the previous state and apply the full-rebuild rules.
fn decide_full(ctx: &BuildContext, state_path: &Path, requested: bool) -> (Option<BuildState>, bool) {
    let log = ctx.log.as_ref();
    let mut full = requested;
    let previous = match BuildState::read(state_path) {
        Ok(state) => state,
        Err(e) => {
            log.warn(&format!("ignoring build state: {e}; doing a full rebuild"));
            full = true;
            None
        }
    };
    if let Some(prev) = &previous
        && prev.strategy != ctx.strategy
    {
        log.info(&format!(
            "strategy changed from {} to {}; doing a full rebuild",
            prev.strategy, ctx.strategy
        ));
        full = true;
    }
    if ctx.strategy == BuildStrategy::Symlink {
        full = true;
    }
    (previous, full)
}

/// Result of the concurrent sync and removal passes.
#[derive(Debug, Default)]
struct SyncPass {
    /// New records in profile order, for installed and unchanged repositories.
    records: Vec<BuildRecord>,
    failures: BuildFailures,
    report: BuildReport,
}

/// Warn when two repositories flatten to the same install directory; the
/// later one overwrites the earlier.
fn warn_shared_install_dirs(repos: &[Repository], log: &dyn Log) {
    let mut seen: HashMap<String, &ReposPath> = HashMap::new();
    for repo in repos {
        if let Some(first) = seen.insert(repo.path.encode(), &repo.path) {
            log.warn(&format!(
                "{first} and {} share the install directory {}",
                repo.path,
                repo.path.encode()
            ));
        }
    }
}

fn sync_repos(
    ctx: &BuildContext,
    strategy: &dyn Strategy,
    prev: &HashMap<ReposPath, BuildRecord>,
    known: &HashSet<ReposPath>,
) -> SyncPass {
    let log = ctx.log.as_ref();
    let mut pass = SyncPass::default();
    let mut kept: HashMap<ReposPath, BuildRecord> = HashMap::new();
    let mut jobs: Vec<(&Repository, Option<&BuildRecord>)> = Vec::new();

    warn_shared_install_dirs(&ctx.profile.repos, log);
    for repo in &ctx.profile.repos {
        let previous = prev.get(&repo.path);
        match (strategy.needs_sync(ctx, repo, previous), previous) {
            (Ok(false), Some(record)) => {
                kept.insert(repo.path.clone(), record.clone());
                pass.report.unchanged += 1;
                log.record(repo.path.as_str(), RepoStatus::Unchanged, None);
            }
            (Ok(_), _) => jobs.push((repo, previous)),
            (Err(e), _) => {
                let err = SyncError::install(repo.path.as_str(), &e);
                log.error(&err.to_string());
                log.record(repo.path.as_str(), RepoStatus::Failed, Some(&format!("{e:#}")));
                pass.failures.push(err);
            }
        }
    }

    let install_root = ctx.paths.install_root();
    let orphans = match list_orphans(&install_root, &ctx.profile.repos) {
        Ok(names) => names,
        Err(e) => {
            log.warn(&format!("cannot scan {}: {e:#}", install_root.display()));
            Vec::new()
        }
    };
    log.debug(&format!(
        "{} to install, {} to remove",
        jobs.len(),
        orphans.len()
    ));

    let (synced, removed) = fanout::fan_out_pair(
        (jobs, |(repo, previous): (&Repository, Option<&BuildRecord>)| {
            (repo, strategy.install(ctx, repo, previous))
        }),
        (orphans, |name: String| {
            let result = fsutil::remove_path(&install_root.join(&name));
            (name, result)
        }),
    );

    let mut installed: HashMap<ReposPath, BuildRecord> = HashMap::new();
    for (repo, result) in synced {
        let name = repo.path.as_str();
        match result {
            Ok(record) => {
                let status = if known.contains(&repo.path) {
                    pass.report.updated += 1;
                    RepoStatus::Updated
                } else {
                    pass.report.added += 1;
                    RepoStatus::Added
                };
                log.debug(&format!("installed {name} at {}", record.version));
                log.record(name, status, None);
                installed.insert(repo.path.clone(), record);
            }
            Err(e) => {
                let err = SyncError::install(name, &e);
                log.error(&err.to_string());
                log.record(name, RepoStatus::Failed, Some(&format!("{e:#}")));
                pass.failures.push(err);
            }
        }
    }

    for (name, result) in removed {
        match result {
            Ok(()) => {
                pass.report.removed += 1;
                log.record(&name, RepoStatus::Removed, None);
            }
            Err(e) => {
                let err = SyncError::remove(name.as_str(), &e);
                log.error(&err.to_string());
                log.record(&name, RepoStatus::Failed, Some(&format!("{e:#}")));
                pass.failures.push(err);
            }
        }
    }

    pass.records = ctx
        .profile
        .repos
        .iter()
        .filter_map(|r| installed.remove(&r.path).or_else(|| kept.remove(&r.path)))
        .collect();
    pass
}

/// Directory names in the install root that no profile repository maps to.
fn list_orphans(install_root: &Path, repos: &[Repository]) -> Result<Vec<String>> {
    let targets: HashSet<String> = repos.iter().map(|r| r.path.encode()).collect();
    let entries = match std::fs::read_dir(install_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", install_root.display())),
    };
    let mut orphans = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !targets.contains(&name) {
            orphans.push(name);
        }
    }
    orphans.sort();
    Ok(orphans)
}

/// Regenerate help tags in `dir`, warning instead of failing the repository.
fn refresh_helptags(ctx: &BuildContext, repo: &Repository, dir: &Path) {
    if let Err(e) =
        base::generate_helptags(dir, ctx.vim.as_deref(), ctx.executor.as_ref(), ctx.log.as_ref())
    {
        ctx.log.warn(&format!("{}: {e:#}", repo.path));
    }
}

/// Revision to install: the locked version, or HEAD when none is locked.
fn locked_rev(repo: &Repository) -> &str {
    if repo.version.is_empty() {
        "HEAD"
    } else {
        &repo.version
    }
}

/// Build contexts over temporary directories for unit tests.
#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub mod test_helpers {
    use std::sync::Arc;

    use super::BuildContext;
    use crate::config::BuildStrategy;
    use crate::config::lockjson::{ActiveProfile, ReposKind, Repository};
    use crate::exec::SystemExecutor;
    use crate::logging::Logger;
    use crate::paths::{Paths, ReposPath};

    /// A temporary `$VOLTPATH` and Vim directory.
    #[derive(Debug)]
    pub struct Sandbox {
        pub dir: tempfile::TempDir,
        pub paths: Paths,
        pub logger: Arc<Logger>,
    }

    impl Sandbox {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = Paths::new(dir.path().join("volt"), dir.path().join("vim"));
            std::fs::create_dir_all(paths.volt_root()).unwrap();
            std::fs::create_dir_all(paths.vim_dir()).unwrap();
            Self {
                dir,
                paths,
                logger: Arc::new(Logger::new()),
            }
        }

        pub fn repo(kind: ReposKind, path: &str, version: &str) -> Repository {
            Repository {
                kind,
                path: ReposPath::from(path),
                version: version.to_string(),
            }
        }

        pub fn context(&self, strategy: BuildStrategy, repos: Vec<Repository>) -> BuildContext {
            BuildContext {
                paths: self.paths.clone(),
                strategy,
                profile: ActiveProfile {
                    name: "default".to_string(),
                    repos,
                },
                vim: None,
                log: self.logger.clone(),
                executor: Arc::new(SystemExecutor),
            }
        }
    }
}
