#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for `volt build`.
//!
//! Each test lays out a `$VOLTPATH` with real git repositories, static
//! plugins and plugconf files, runs the build engine and inspects the
//! install root, `build-info.json` and the generated bundle.

mod common;

use std::time::{Duration, SystemTime};

use common::{VoltEnv, mtime};
use git2::{ObjectType, Oid};
use volt_cli::build::build;
use volt_cli::build::base::RC_MARKER;
use volt_cli::build::state::BuildState;
use volt_cli::config::BuildStrategy;
use volt_cli::error::BuildError;

const A: &str = "github.com/x/a";
const B: &str = "github.com/x/b";
const S: &str = "localhost/local/mine";

fn state(env: &VoltEnv) -> BuildState {
    BuildState::read(&env.paths.build_info())
        .expect("read state")
        .expect("state exists")
}

// ---------------------------------------------------------------------------
// Incremental copy builds
// ---------------------------------------------------------------------------

/// A second build with nothing changed writes nothing.
#[test]
fn unchanged_build_is_idempotent() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("plugin/a.vim", b"let g:a = 1", 0o100_644)]);
    env.static_plugin(S, &[("plugin/s.vim", "let g:s = 1")]);
    env.plugconf(A, "function! s:config()\n  let g:a_conf = 1\nendfunction\n");

    let first = build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert_eq!(first.added, 2);

    let state_bytes = std::fs::read(env.paths.build_info()).unwrap();
    let state_mtime = mtime(&env.paths.build_info());
    let bundle_mtime = mtime(&env.paths.bundle_path());
    let file_mtime = mtime(&env.installed(A).join("plugin/a.vim"));

    let second = build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert_eq!(second.unchanged, 2);
    assert!(!second.changed());
    assert_eq!(std::fs::read(env.paths.build_info()).unwrap(), state_bytes);
    assert_eq!(mtime(&env.paths.build_info()), state_mtime);
    assert_eq!(mtime(&env.paths.bundle_path()), bundle_mtime);
    assert_eq!(mtime(&env.installed(A).join("plugin/a.vim")), file_mtime);
}

/// Touching a file of a static plugin triggers exactly one resync.
#[test]
fn static_plugin_resyncs_after_modification() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("plugin/a.vim", b"a", 0o100_644)]);
    env.static_plugin(S, &[("plugin/s.vim", "one")]);
    build(&env.context(BuildStrategy::Copy), false).unwrap();

    let file = env.source(S).join("plugin/s.vim");
    std::fs::write(&file, "two").unwrap();
    std::fs::OpenOptions::new()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    let report = build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(
        std::fs::read_to_string(env.installed(S).join("plugin/s.vim")).unwrap(),
        "two"
    );
}

/// Tree extraction reproduces every blob and records its id.
#[test]
fn bare_extraction_matches_tree() {
    let mut env = VoltEnv::new();
    let files: &[(&str, &[u8], i32)] = &[
        ("plugin/a.vim", b"let g:a = 1\n", 0o100_644),
        ("autoload/a/deep.vim", b"function! a#deep#f()\nendfunction\n", 0o100_644),
        ("bin/helper", b"#!/bin/sh\necho hi\n", 0o100_755),
    ];
    let commit = env.bare_plugin(A, files);
    build(&env.context(BuildStrategy::Copy), false).unwrap();

    let record = state(&env).repos.into_iter().next().unwrap();
    assert_eq!(record.version, commit);
    assert!(!record.dirty_worktree);
    assert_eq!(record.files.len(), files.len());
    for (path, content, _) in files {
        assert_eq!(std::fs::read(env.installed(A).join(path)).unwrap(), *content);
        let oid = Oid::hash_object(ObjectType::Blob, content).unwrap();
        assert_eq!(record.files[*path], oid.to_string());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let mode = std::fs::metadata(env.installed(A).join("bin/helper"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o100, 0);
    }
}

/// A version bump rewrites changed blobs and deletes vanished ones.
#[test]
fn version_bump_applies_tree_diff() {
    let mut env = VoltEnv::new();
    env.bare_plugin(
        A,
        &[
            ("plugin/a.vim", b"v1", 0o100_644),
            ("plugin/gone.vim", b"bye", 0o100_644),
            ("ftplugin/old/x.vim", b"x", 0o100_644),
        ],
    );
    env.bare_plugin(B, &[("plugin/b.vim", b"b", 0o100_644)]);
    build(&env.context(BuildStrategy::Copy), false).unwrap();

    let bumped = env.bare_update(A, &[("plugin/a.vim", b"v2", 0o100_644)]);
    let report = build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);

    let dst = env.installed(A);
    assert_eq!(std::fs::read_to_string(dst.join("plugin/a.vim")).unwrap(), "v2");
    assert!(!dst.join("plugin/gone.vim").exists());
    assert!(!dst.join("ftplugin").exists());
    assert_eq!(state(&env).repos[0].version, bumped);
}

/// `--full` reinstalls everything even when nothing changed.
#[test]
fn full_build_reinstalls_everything() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("a.vim", b"a", 0o100_644)]);
    env.bare_plugin(B, &[("b.vim", b"b", 0o100_644)]);
    build(&env.context(BuildStrategy::Copy), false).unwrap();

    let report = build(&env.context(BuildStrategy::Copy), true).unwrap();
    assert!(report.full);
    assert_eq!(report.updated, 2);
    assert_eq!(report.unchanged, 0);
}

/// Dropping a plugin from the profile removes its directory and record.
#[test]
fn removed_plugin_is_deleted() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("a.vim", b"a", 0o100_644)]);
    env.bare_plugin(B, &[("b.vim", b"b", 0o100_644)]);
    build(&env.context(BuildStrategy::Copy), false).unwrap();

    env.unlock(B);
    let report = build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert_eq!(report.removed, 1);
    assert!(!env.installed(B).exists());
    let repos = state(&env).repos;
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].path.as_str(), A);
    assert!(!env.bundle().contains("github.com_x_b"));
}

// ---------------------------------------------------------------------------
// rc files
// ---------------------------------------------------------------------------

/// A hand-written vimrc is never overwritten.
#[test]
fn hand_written_vimrc_is_protected() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("a.vim", b"a", 0o100_644)]);
    env.profile_rc("vimrc.vim", "set number\n");
    std::fs::write(env.paths.vimrc(), "\" mine\n").unwrap();

    let err = build(&env.context(BuildStrategy::Copy), false).unwrap_err();
    assert!(matches!(err, BuildError::RcFile(_)));
    assert_eq!(std::fs::read_to_string(env.paths.vimrc()).unwrap(), "\" mine\n");

    std::fs::remove_file(env.paths.vimrc()).unwrap();
    build(&env.context(BuildStrategy::Copy), false).unwrap();
    let installed = std::fs::read_to_string(env.paths.vimrc()).unwrap();
    assert!(installed.starts_with(RC_MARKER));
    assert!(installed.ends_with("set number\n"));
}

/// Without a profile rc file, a hand-written vimrc is left alone.
#[test]
fn hand_written_vimrc_without_profile_source_is_kept() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("a.vim", b"a", 0o100_644)]);
    std::fs::write(env.paths.vimrc(), "\" mine\n").unwrap();

    build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert_eq!(std::fs::read_to_string(env.paths.vimrc()).unwrap(), "\" mine\n");
}

// ---------------------------------------------------------------------------
// Plugconf bundle
// ---------------------------------------------------------------------------

/// A plugin listed first but depending on a later one is bundled after it.
#[test]
fn dependency_precedes_dependent_in_bundle() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("plugin/a.vim", b"a", 0o100_644)]);
    env.bare_plugin(B, &[("plugin/b.vim", b"b", 0o100_644)]);
    env.plugconf(
        A,
        "function! s:loaded_on() abort\n  return 'filetype=python'\nendfunction\n\n\
         function! s:config() abort\n  let g:a_configured = 1\nendfunction\n\n\
         function! s:depends() abort\n  return ['github.com/x/b']\nendfunction\n",
    );

    build(&env.context(BuildStrategy::Copy), false).unwrap();
    insta::assert_snapshot!("bundle_dependency_order", env.bundle());
}

/// A broken plugconf fails the build and loses its bundle segment, but the
/// plugin is still installed and the others are bundled.
#[test]
fn broken_plugconf_is_reported() {
    let mut env = VoltEnv::new();
    env.bare_plugin(A, &[("a.vim", b"a", 0o100_644)]);
    env.bare_plugin(B, &[("b.vim", b"b", 0o100_644)]);
    env.plugconf(A, "let g:not_allowed = 1\n");

    let err = build(&env.context(BuildStrategy::Copy), false).unwrap_err();
    match err {
        BuildError::Failures(f) => assert_eq!(f.len(), 1),
        other => panic!("unexpected error: {other}"),
    }
    assert!(env.installed(A).join("a.vim").exists());
    let bundle = env.bundle();
    assert!(!bundle.contains("github.com_x_a"));
    assert!(bundle.contains("call s:activate('github.com_x_b', '', 0)"));
    assert_eq!(state(&env).repos.len(), 2);
}

// ---------------------------------------------------------------------------
// Symlink strategy
// ---------------------------------------------------------------------------

/// Worktrees and static plugins are linked; bare repositories are extracted.
#[cfg(unix)]
#[test]
fn symlink_strategy_links_sources() {
    let mut env = VoltEnv::new();
    env.worktree_plugin(A, &[("plugin/a.vim", "a")]);
    env.bare_plugin(B, &[("plugin/b.vim", b"b", 0o100_644)]);
    env.static_plugin(S, &[("plugin/s.vim", "s")]);

    let report = build(&env.context(BuildStrategy::Symlink), false).unwrap();
    assert!(report.full);
    assert_eq!(report.added, 3);

    let is_link = |p: &std::path::Path| {
        std::fs::symlink_metadata(p)
            .unwrap()
            .file_type()
            .is_symlink()
    };
    assert!(is_link(&env.installed(A)));
    assert!(is_link(&env.installed(S)));
    assert!(!is_link(&env.installed(B)));
    assert!(env.installed(A).join("plugin/a.vim").is_file());
    assert_eq!(state(&env).strategy, BuildStrategy::Symlink);

    // Every symlink build is full, so the second run reinstalls all three.
    let again = build(&env.context(BuildStrategy::Symlink), false).unwrap();
    assert!(again.full);
    assert_eq!(again.updated, 3);
}

/// Switching strategy replaces links with real directories.
#[cfg(unix)]
#[test]
fn switching_to_copy_replaces_links() {
    let mut env = VoltEnv::new();
    env.worktree_plugin(A, &[("plugin/a.vim", "a")]);
    build(&env.context(BuildStrategy::Symlink), false).unwrap();

    let report = build(&env.context(BuildStrategy::Copy), false).unwrap();
    assert!(report.full);
    let meta = std::fs::symlink_metadata(env.installed(A)).unwrap();
    assert!(meta.is_dir());
    assert!(env.source(A).join("plugin/a.vim").is_file());
    assert_eq!(state(&env).strategy, BuildStrategy::Copy);
}
