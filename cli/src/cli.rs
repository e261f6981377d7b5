use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the volt plugin manager.
#[derive(Parser, Debug)]
#[command(name = "volt", about = "Vim plugin manager", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install the active profile's plugins into the Vim package directory
    Build(BuildOpts),
    /// Print version information
    Version,
}

/// Options for the `build` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct BuildOpts {
    /// Remove every installed plugin and rebuild from scratch
    #[arg(short, long)]
    pub full: bool,
}
