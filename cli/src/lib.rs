//! Build synchronization engine of the volt Vim plugin manager.
//!
//! `volt build` reconciles `~/.vim/pack/volt/opt` with the active profile in
//! `$VOLTPATH/lock.json`, installs the profile's vimrc/gvimrc and writes the
//! bundled plugconf script that activates every plugin at startup.
//!
//! - **[`config`]**: `config.toml` and `lock.json`
//! - **[`build`]**: orchestrator, persisted state and install strategies
//! - **[`plugconf`]**: per-plugin config parsing, dependency ranking, bundling
//! - **[`commands`]**: top-level subcommand handlers
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod build;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
pub mod logging;
pub mod paths;
pub mod plugconf;
pub mod trx;
