//! Database error types for strata-db.

use strata_core::CoreError;
use thiserror::Error;

/// Domain rules a write would break. The message is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("Invalid cars: {}", join_ids(.0))]
    MissingCars(Vec<i64>),

    #[error("Car name must be unique - unavailable car names: {}", quote_all(.0))]
    CarNamesTaken(Vec<String>),

    #[error("Car \"{0}\" is defined more than once with different fields")]
    ConflictingCarDefinitions(String),

    #[error("Name must be unique - \"{0}\" is already used by a current version")]
    NameTaken(String),

    #[error("This file has already been imported or is already in progress (hash: {hash})")]
    AlreadyImported { hash: String },
}

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Violation(#[from] Violation),

    /// Lookup miss or rejected status transition.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Serialization conflicts persisted through every retry.
    #[error("Write conflict persisted after {attempts} attempts: {last}")]
    Conflict { attempts: u32, last: String },

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether the error is a lock/busy signal that a retry may clear.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::LibSql(e) => crate::retry::is_conflict_error(e),
            _ => false,
        }
    }

    /// Whether a libSQL error is a UNIQUE constraint failure.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::LibSql(e) if e.to_string().contains("UNIQUE constraint failed"))
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote_all(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
