use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a JSON or YAML file of human beings.
    Import(ImportArgs),

    /// Show one import operation.
    Status {
        /// Import operation id (e.g. imp-1a2b3c4d).
        id: String,
    },

    /// List import operations, newest first.
    List,

    /// Print a time-limited download URL for a successful import's file.
    DownloadUrl {
        id: String,
    },

    /// Show every version in the chain containing an entity.
    Versions {
        entity_id: i64,
    },

    /// Delete one version and repair its chain.
    Delete {
        entity_id: i64,
    },

    /// Rename one version. The renamed version starts a chain of its own.
    Rename {
        entity_id: i64,
        new_name: String,
    },
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// File to import (.json, .yaml or .yml).
    pub file: PathBuf,

    /// Wait for the import to finish, showing progress.
    #[arg(short, long)]
    pub wait: bool,
}
