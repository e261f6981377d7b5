//! Command: print version information.

/// Version string baked in at build time, or the package version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("VOLT_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the volt version to stdout.
pub fn run() {
    println!("volt {}", version());
}
