//! Logging infrastructure: the [`Log`] trait, the tracing-backed [`Logger`],
//! and the console subscriber that renders `[INFO]`/`[WARN]`/`[ERROR]` tags.

mod logger;
mod subscriber;
mod types;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, RepoEntry, RepoStatus};
