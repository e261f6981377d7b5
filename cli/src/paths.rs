//! Filesystem layout of `$VOLTPATH` and the Vim directory.
//!
//! ```text
//! $VOLTPATH/                      (default ~/volt)
//! ├── lock.json
//! ├── config.toml
//! ├── trx.lock
//! ├── repos/<host>/<user>/<name>/
//! ├── plugconf/<host>/<user>/<name>.vim
//! └── rc/<profile>/{vimrc.vim,gvimrc.vim}
//!
//! ~/.vim/                         (~/vimfiles on Windows)
//! ├── vimrc, gvimrc
//! └── pack/volt/
//!     ├── build-info.json
//!     ├── opt/<host>_<user>_<name>/
//!     └── start/system/plugin/bundled_plugconf.vim
//! ```
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// File name of the profile vimrc under `rc/<profile>/`.
pub const PROFILE_VIMRC: &str = "vimrc.vim";
/// File name of the profile gvimrc under `rc/<profile>/`.
pub const PROFILE_GVIMRC: &str = "gvimrc.vim";

/// Hierarchical repository identity such as `github.com/tyru/caw.vim`.
///
/// Always `/`-separated regardless of platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReposPath(String);

impl ReposPath {
    /// Wrap a repository path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path as written in `lock.json`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name used under the install root (`/` replaced by `_`).
    ///
    /// `:packadd` takes a single directory name, so the hierarchy is flattened.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0.replace('/', "_")
    }

    /// Whether the path stays inside the directory it is joined onto: at
    /// least one component, and none that is `.` or `..` or holds a backslash.
    #[must_use]
    pub fn is_contained(&self) -> bool {
        let mut parts = self.0.split('/').filter(|c| !c.is_empty()).peekable();
        parts.peek().is_some() && parts.all(|c| c != "." && c != ".." && !c.contains('\\'))
    }

    /// Append the path components to `base` using the platform separator.
    fn join_onto(&self, base: &Path) -> PathBuf {
        self.0
            .split('/')
            .filter(|c| !c.is_empty())
            .fold(base.to_path_buf(), |acc, c| acc.join(c))
    }
}

impl fmt::Display for ReposPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReposPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resolved locations of every file the build engine reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    volt_root: PathBuf,
    vim_dir: PathBuf,
}

impl Paths {
    /// Create a layout rooted at explicit directories.
    #[must_use]
    pub fn new(volt_root: impl Into<PathBuf>, vim_dir: impl Into<PathBuf>) -> Self {
        Self {
            volt_root: volt_root.into(),
            vim_dir: vim_dir.into(),
        }
    }

    /// Resolve the layout from the environment.
    ///
    /// `$VOLTPATH` overrides `~/volt`; `$VOLT_VIM_DIR` overrides `~/.vim`
    /// (`~/vimfiles` on Windows).
    ///
    /// # Errors
    ///
    /// Returns an error if a default is needed and neither `HOME` nor
    /// `USERPROFILE` is set.
    pub fn detect() -> Result<Self> {
        let volt_root = match std::env::var_os("VOLTPATH").filter(|v| !v.is_empty()) {
            Some(v) => PathBuf::from(v),
            None => home_dir()?.join("volt"),
        };
        let vim_dir = match std::env::var_os("VOLT_VIM_DIR").filter(|v| !v.is_empty()) {
            Some(v) => PathBuf::from(v),
            None => home_dir()?.join(if cfg!(windows) { "vimfiles" } else { ".vim" }),
        };
        Ok(Self::new(volt_root, vim_dir))
    }

    /// `$VOLTPATH`.
    #[must_use]
    pub fn volt_root(&self) -> &Path {
        &self.volt_root
    }

    /// `~/.vim`.
    #[must_use]
    pub fn vim_dir(&self) -> &Path {
        &self.vim_dir
    }

    #[must_use]
    pub fn lock_json(&self) -> PathBuf {
        self.volt_root.join("lock.json")
    }

    #[must_use]
    pub fn config_toml(&self) -> PathBuf {
        self.volt_root.join("config.toml")
    }

    #[must_use]
    pub fn trx_lock(&self) -> PathBuf {
        self.volt_root.join("trx.lock")
    }

    /// Source checkout (or static import) of a repository.
    #[must_use]
    pub fn full_repos_path(&self, repos: &ReposPath) -> PathBuf {
        repos.join_onto(&self.volt_root.join("repos"))
    }

    /// Plugconf script of a repository.
    #[must_use]
    pub fn plugconf_path(&self, repos: &ReposPath) -> PathBuf {
        let mut path = repos.join_onto(&self.volt_root.join("plugconf"));
        let file = path
            .file_name()
            .map(|n| format!("{}.vim", n.to_string_lossy()))
            .unwrap_or_default();
        path.set_file_name(file);
        path
    }

    /// Directory holding a profile's `vimrc.vim` / `gvimrc.vim`.
    #[must_use]
    pub fn rc_dir(&self, profile: &str) -> PathBuf {
        self.volt_root.join("rc").join(profile)
    }

    /// Installed `~/.vim/vimrc`.
    #[must_use]
    pub fn vimrc(&self) -> PathBuf {
        self.vim_dir.join("vimrc")
    }

    /// Installed `~/.vim/gvimrc`.
    #[must_use]
    pub fn gvimrc(&self) -> PathBuf {
        self.vim_dir.join("gvimrc")
    }

    /// `~/.vim/pack/volt`.
    #[must_use]
    pub fn vim_volt_dir(&self) -> PathBuf {
        self.vim_dir.join("pack").join("volt")
    }

    /// Install root: one directory per active repository.
    #[must_use]
    pub fn install_root(&self) -> PathBuf {
        self.vim_volt_dir().join("opt")
    }

    /// Install destination of a repository.
    #[must_use]
    pub fn install_path(&self, repos: &ReposPath) -> PathBuf {
        self.install_root().join(repos.encode())
    }

    /// Generated bundle loaded by Vim at startup.
    #[must_use]
    pub fn bundle_path(&self) -> PathBuf {
        self.vim_volt_dir()
            .join("start")
            .join("system")
            .join("plugin")
            .join("bundled_plugconf.vim")
    }

    /// Persisted build state.
    #[must_use]
    pub fn build_info(&self) -> PathBuf {
        self.vim_volt_dir().join("build-info.json")
    }
}

/// User home directory from `HOME` (or `USERPROFILE` on Windows).
fn home_dir() -> Result<PathBuf> {
    let home = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE")
            .or_else(|_| std::env::var("HOME"))
            .map_err(|_| anyhow::anyhow!("neither USERPROFILE nor HOME environment variable is set"))?
    } else {
        std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable is not set"))?
    };
    Ok(PathBuf::from(home))
}
