//! Command: `volt build`.
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::CommandSetup;
use crate::build::{self, BuildContext};
use crate::cli::BuildOpts;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::paths::Paths;
use crate::trx::TrxLock;

/// Run the build command.
///
/// # Errors
///
/// Returns an error if another volt process holds the lock, configuration
/// cannot be loaded, or the build fails.
pub fn run(opts: &BuildOpts, log: &Arc<Logger>) -> Result<()> {
    let paths = Paths::detect()?;
    let _lock = TrxLock::acquire(&paths.trx_lock(), "volt build")?;
    log.info(&format!("volt {}", super::version::version()));

    let setup = CommandSetup::init(paths, log)?;
    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
    let vim = resolve_vim(executor.as_ref(), log.as_ref());

    let ctx = BuildContext {
        paths: setup.paths,
        strategy: setup.config.build.strategy,
        profile: setup.profile,
        vim,
        log: Arc::clone(log) as Arc<dyn Log>,
        executor,
    };

    let result = build::build(&ctx, opts.full);
    log.print_summary();
    let report = result?;

    if report.full {
        log.info("Completed full rebuild");
    } else {
        log.info("Completed");
    }
    Ok(())
}

/// Editor used for helptags: `$VOLT_VIM`, else `vim` on `PATH`.
fn resolve_vim(executor: &dyn Executor, log: &dyn Log) -> Option<PathBuf> {
    if let Some(vim) = std::env::var_os("VOLT_VIM").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(vim));
    }
    let found = executor.which("vim");
    if found.is_none() {
        log.warn("vim not found on PATH; help tags will not be generated");
    }
    found
}
