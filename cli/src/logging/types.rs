//! Core logging types: per-repository outcomes and the [`Log`] trait.

/// Outcome of one repository during a build, kept for the summary.
#[derive(Debug, Clone)]
pub struct RepoEntry {
    /// Repository path (`host/user/name`) or install directory name.
    pub name: String,
    /// What happened to the repository.
    pub status: RepoStatus,
    /// Optional detail (e.g. the error message of a failure).
    pub message: Option<String>,
}

/// What a build did to a single repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    /// Installed for the first time.
    Added,
    /// Re-synchronized because its version or worktree changed.
    Updated,
    /// Removed from the install root.
    Removed,
    /// Already up to date; nothing was written.
    Unchanged,
    /// Install or removal failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// The build engine logs through `Arc<dyn Log>` so that per-repository
/// tasks running on worker threads share one sink.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (suppressed on console unless verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a repository outcome for the summary.
    fn record(&self, name: &str, status: RepoStatus, message: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_status_equality() {
        assert_eq!(RepoStatus::Added, RepoStatus::Added);
        assert_ne!(RepoStatus::Added, RepoStatus::Updated);
        assert_ne!(RepoStatus::Removed, RepoStatus::Failed);
    }
}
