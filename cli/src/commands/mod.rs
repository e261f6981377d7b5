//! Top-level subcommand handlers.
pub mod build;
pub mod version;

use anyhow::Result;

use crate::config::Config;
use crate::config::lockjson::{ActiveProfile, LockJson};
use crate::logging::Logger;
use crate::paths::Paths;

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    pub paths: Paths,
    pub config: Config,
    pub profile: ActiveProfile,
}

impl CommandSetup {
    /// Resolve the directory layout, then load `config.toml` and the active
    /// profile from `lock.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or either
    /// file fails to load.
    pub fn init(paths: Paths, log: &Logger) -> Result<Self> {
        log.stage("Loading configuration");
        let config = Config::load(&paths.config_toml())?;
        log.debug(&format!("strategy: {}", config.build.strategy));

        let lock = LockJson::read(&paths.lock_json())?;
        let profile = lock.active_profile()?;
        log.info(&format!(
            "profile: {} ({} repositories)",
            profile.name,
            profile.repos.len()
        ));

        Ok(Self {
            paths,
            config,
            profile,
        })
    }
}
