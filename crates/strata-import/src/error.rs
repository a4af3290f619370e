//! Import pipeline error types.
//!
//! [`ImportError`] sorts every failure into one of three buckets: problems with
//! what the user submitted, write conflicts that outlasted the retry limit, and
//! infrastructure faults. Only the first kind is shown to users verbatim.

use strata_core::CoreError;
use strata_core::enums::ImportStatus;
use strata_db::error::{DatabaseError, Violation};
use strata_storage::StorageError;
use thiserror::Error;

use crate::parser::FileFormat;

/// Message recorded for infrastructure faults. Details only go to the log.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Failures while decoding an import file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unsupported file type: {0}. Only json, yaml, yml files are allowed")]
    UnsupportedFormat(String),

    #[error("Malformed {format} file: {reason}")]
    Malformed { format: FileFormat, reason: String },

    #[error("not an array")]
    NotAnArray,

    #[error("no valid items")]
    NoValidItems,
}

/// Outcome of a job that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The job ran and rejected its input.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The worker panicked or was torn down before replying.
    #[error("job worker crashed: {0}")]
    WorkerCrashed(String),

    /// The queue was shut down before the job could run.
    #[error("job queue is closed")]
    QueueClosed,
}

/// Problems with the submission itself. Never retried.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("File is too large: {size} bytes (limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Violation(#[from] Violation),

    #[error("Import operation #{0} not found")]
    NotFound(String),

    #[error(
        "Import operation #{id} cannot be downloaded. Status: {status} (must be {})",
        ImportStatus::Success
    )]
    NotDownloadable { id: String, status: ImportStatus },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    User(#[from] UserError),

    /// Write conflicts persisted through every retry. Resubmitting may succeed.
    #[error("Import conflicted with concurrent writes {attempts} times")]
    Conflict { attempts: u32 },

    #[error("{INTERNAL_ERROR_MESSAGE}: {0}")]
    Infrastructure(String),
}

impl ImportError {
    /// Text stored as the operation's `errorMessage`.
    #[must_use]
    pub fn operation_message(&self) -> String {
        match self {
            Self::User(e) => e.to_string(),
            Self::Conflict { .. } => {
                "Import conflicted with concurrent imports; please resubmit the file".to_string()
            }
            Self::Infrastructure(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl From<ParseError> for ImportError {
    fn from(e: ParseError) -> Self {
        Self::User(UserError::Parse(e))
    }
}

impl From<Violation> for ImportError {
    fn from(v: Violation) -> Self {
        Self::User(UserError::Violation(v))
    }
}

impl From<DatabaseError> for ImportError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Violation(v) => v.into(),
            DatabaseError::Conflict { attempts, .. } => Self::Conflict { attempts },
            DatabaseError::Core(CoreError::NotFound { entity_type, id }) => {
                Self::Infrastructure(format!("{entity_type} #{id} vanished"))
            }
            other => Self::Infrastructure(other.to_string()),
        }
    }
}

impl From<StorageError> for ImportError {
    fn from(e: StorageError) -> Self {
        Self::Infrastructure(e.to_string())
    }
}

impl From<JobError> for ImportError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::Parse(p) => p.into(),
            other => Self::Infrastructure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn user_errors_are_recorded_verbatim() {
        let err: ImportError = Violation::MissingCars(vec![999]).into();
        assert!(err.is_user_error());
        assert_eq!(err.operation_message(), "Invalid cars: 999");
    }

    #[test]
    fn infrastructure_detail_is_not_recorded() {
        let err: ImportError = JobError::WorkerCrashed("task 7 panicked".into()).into();
        assert_eq!(err.operation_message(), "Internal error");
        assert!(err.to_string().contains("task 7 panicked"));
    }

    #[test]
    fn exhausted_retries_become_conflicts() {
        let err: ImportError = DatabaseError::Conflict {
            attempts: 10,
            last: "database is locked".into(),
        }
        .into();
        assert!(matches!(err, ImportError::Conflict { attempts: 10 }));
        assert!(!err.operation_message().contains("locked"));
    }

    #[test]
    fn download_refusal_names_required_status() {
        let err = UserError::NotDownloadable {
            id: "imp-1".into(),
            status: ImportStatus::Failed,
        };
        assert_eq!(
            err.to_string(),
            "Import operation #imp-1 cannot be downloaded. Status: failed (must be success)"
        );
    }
}
