//! Plugconf loading, dependency ranking and bundling.
pub mod bundle;
pub mod graph;
pub mod parser;

use anyhow::Result;

use crate::build::fsutil;
use crate::config::lockjson::Repository;
use crate::error::PlugconfError;
use crate::logging::Log;
use crate::paths::Paths;

pub use bundle::PlugconfInfo;
pub use parser::{LoadOn, Plugconf};

/// What writing the bundle did.
#[derive(Debug, Default)]
pub struct BundleOutcome {
    /// The bundle file changed on disk.
    pub written: bool,
    /// Plugconf files that could not be read or parsed. Their plugins get
    /// no bundle segment.
    pub errors: Vec<PlugconfError>,
}

/// Read the plugconf of one repository. `Ok(None)` when it has none.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load(paths: &Paths, repo: &Repository) -> Result<Option<Plugconf>, PlugconfError> {
    let path = paths.plugconf_path(&repo.path);
    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(PlugconfError::Read { path, source }),
    };
    parser::parse(&source, &path).map(Some)
}

/// Load every plugconf, numbered by position in `repos` (starting at 1).
///
/// Repositories whose plugconf fails to load are left out of the returned
/// infos; their ids are not reused.
#[must_use]
pub fn load_all(paths: &Paths, repos: &[Repository]) -> (Vec<PlugconfInfo>, Vec<PlugconfError>) {
    let mut errors = Vec::new();
    let infos = repos
        .iter()
        .enumerate()
        .filter_map(|(i, repo)| match load(paths, repo) {
            Ok(plugconf) => Some(PlugconfInfo {
                sequence_id: i + 1,
                repos_path: repo.path.clone(),
                plugconf,
            }),
            Err(e) => {
                errors.push(e);
                None
            }
        })
        .collect();
    (infos, errors)
}

/// Order `infos` so every dependency precedes its dependents.
///
/// Cycles and dependencies outside the set are reported through `log`.
#[must_use]
pub fn rank<'a>(infos: &'a [PlugconfInfo], log: &dyn Log) -> Vec<&'a PlugconfInfo> {
    let input: Vec<_> = infos
        .iter()
        .map(|info| {
            let deps = info
                .plugconf
                .as_ref()
                .map(|p| p.depends.clone())
                .unwrap_or_default();
            (info.repos_path.clone(), deps)
        })
        .collect();

    let ranking = graph::rank(&input);
    for (repo, dep) in &ranking.unknown {
        log.warn(&format!(
            "{repo} depends on {dep}, which is not installed in this profile"
        ));
    }
    if ranking.cyclic {
        log.warn("plugconf dependencies contain a cycle; load order within it is unspecified");
    }

    ranking
        .order
        .iter()
        .filter_map(|&i| infos.get(i))
        .collect()
}

/// Regenerate the bundle for `repos` (the installed repositories in profile order).
///
/// # Errors
///
/// Returns an error only if the bundle file cannot be written; plugconf
/// problems are collected in [`BundleOutcome::errors`].
pub fn write_bundle(paths: &Paths, repos: &[Repository], log: &dyn Log) -> Result<BundleOutcome> {
    let (infos, errors) = load_all(paths, repos);
    for e in &errors {
        log.error(&e.to_string());
    }
    let ordered = rank(&infos, log);
    let content = bundle::generate(&ordered);
    let written = fsutil::write_if_changed(&paths.bundle_path(), content.as_bytes())?;
    if written {
        log.debug(&format!("wrote {}", paths.bundle_path().display()));
    }
    Ok(BundleOutcome { written, errors })
}
