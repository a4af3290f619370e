use clap::Parser;

pub mod commands;
pub mod global;

pub use commands::{Commands, ImportArgs};
pub use global::{GlobalFlags, OutputFormat};

/// Top-level CLI parser for the `strata` binary.
#[derive(Debug, Parser)]
#[command(name = "strata", version, about = "Strata - versioned bulk imports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only, no progress)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database path, overriding configuration
    #[arg(long, global = true)]
    pub database: Option<String>,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            database: self.database.clone(),
        }
    }
}
