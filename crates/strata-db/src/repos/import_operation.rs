//! Import operation registry: creation, lookup, and status transitions.
//!
//! Each transition returns the sparse update it wrote so the caller can
//! broadcast exactly what changed.

use chrono::Utc;
use strata_core::CoreError;
use strata_core::entities::ImportOperation;
use strata_core::enums::ImportStatus;
use strata_core::progress::ImportOperationUpdate;

use crate::error::{DatabaseError, Violation};
use crate::helpers::{
    count_param, generate_id, get_opt_count, get_opt_datetime, parse_datetime, parse_enum,
};

pub const ID_PREFIX: &str = "imp";

const SELECT_COLS: &str = "id, file_name, file_hash, status, entry_count, ok_count, \
     duplicate_count, created_at, started_at, finished_at, error_message";

fn row_to_operation(row: &libsql::Row) -> Result<ImportOperation, DatabaseError> {
    Ok(ImportOperation {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_hash: row.get(2)?,
        status: parse_enum(&row.get::<String>(3)?)?,
        entry_count: get_opt_count(row, 4)?,
        ok_count: get_opt_count(row, 5)?,
        duplicate_count: get_opt_count(row, 6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        started_at: get_opt_datetime(row, 8)?,
        finished_at: get_opt_datetime(row, 9)?,
        error_message: row.get(10)?,
    })
}

/// Insert a PENDING record, claiming `file_hash`.
///
/// # Errors
///
/// [`Violation::AlreadyImported`] when a pending, running, or successful
/// import already holds the hash.
pub async fn create(
    conn: &libsql::Connection,
    file_name: &str,
    file_hash: &str,
) -> Result<ImportOperation, DatabaseError> {
    let id = generate_id(conn, ID_PREFIX).await?;
    let now = Utc::now();

    let inserted = conn
        .execute(
            "INSERT INTO import_operations (id, file_name, file_hash, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![
                id.as_str(),
                file_name,
                file_hash,
                ImportStatus::Pending.as_str(),
                now.to_rfc3339()
            ],
        )
        .await
        .map_err(DatabaseError::from);

    match inserted {
        Ok(_) => {}
        Err(e) if e.is_unique_violation() => {
            return Err(Violation::AlreadyImported {
                hash: file_hash.to_string(),
            }
            .into());
        }
        Err(e) => return Err(e),
    }

    Ok(ImportOperation {
        id,
        file_name: file_name.to_string(),
        file_hash: file_hash.to_string(),
        status: ImportStatus::Pending,
        entry_count: None,
        ok_count: None,
        duplicate_count: None,
        created_at: now,
        started_at: None,
        finished_at: None,
        error_message: None,
    })
}

/// # Errors
///
/// [`CoreError::NotFound`] when no record has this id.
pub async fn get(conn: &libsql::Connection, id: &str) -> Result<ImportOperation, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM import_operations WHERE id = ?1"),
            [id],
        )
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| CoreError::not_found("Import operation", id))?;
    row_to_operation(&row)
}

/// All records, newest first.
pub async fn list(conn: &libsql::Connection) -> Result<Vec<ImportOperation>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM import_operations
                 ORDER BY created_at DESC, rowid DESC"
            ),
            (),
        )
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_operation(&row)?);
    }
    Ok(out)
}

/// The non-failed record holding `file_hash`, if any.
pub async fn find_active_by_hash(
    conn: &libsql::Connection,
    file_hash: &str,
) -> Result<Option<ImportOperation>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM import_operations
                 WHERE file_hash = ?1 AND status != 'failed'"
            ),
            [file_hash],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_operation(&row)?)),
        None => Ok(None),
    }
}

/// PENDING → IN_PROGRESS, recording the parsed entry count.
pub async fn mark_started(
    conn: &libsql::Connection,
    id: &str,
    entry_count: u64,
) -> Result<ImportOperationUpdate, DatabaseError> {
    let now = Utc::now();
    transition(conn, id, ImportStatus::InProgress).await?;
    conn.execute(
        "UPDATE import_operations SET status = ?1, started_at = ?2, entry_count = ?3
         WHERE id = ?4",
        libsql::params![
            ImportStatus::InProgress.as_str(),
            now.to_rfc3339(),
            count_param(entry_count)?,
            id
        ],
    )
    .await?;

    let mut update = ImportOperationUpdate::new(id);
    update.status = Some(ImportStatus::InProgress);
    update.started_at = Some(now);
    update.entry_count = Some(entry_count);
    Ok(update)
}

/// IN_PROGRESS → SUCCESS with the merge counts.
pub async fn mark_succeeded(
    conn: &libsql::Connection,
    id: &str,
    ok_count: u64,
    duplicate_count: u64,
) -> Result<ImportOperationUpdate, DatabaseError> {
    let now = Utc::now();
    transition(conn, id, ImportStatus::Success).await?;
    conn.execute(
        "UPDATE import_operations
         SET status = ?1, finished_at = ?2, ok_count = ?3, duplicate_count = ?4
         WHERE id = ?5",
        libsql::params![
            ImportStatus::Success.as_str(),
            now.to_rfc3339(),
            count_param(ok_count)?,
            count_param(duplicate_count)?,
            id
        ],
    )
    .await?;

    let mut update = ImportOperationUpdate::new(id);
    update.status = Some(ImportStatus::Success);
    update.finished_at = Some(now);
    update.ok_count = Some(ok_count);
    update.duplicate_count = Some(duplicate_count);
    Ok(update)
}

/// PENDING or IN_PROGRESS → FAILED with a user-facing message.
pub async fn mark_failed(
    conn: &libsql::Connection,
    id: &str,
    message: &str,
) -> Result<ImportOperationUpdate, DatabaseError> {
    let now = Utc::now();
    transition(conn, id, ImportStatus::Failed).await?;
    conn.execute(
        "UPDATE import_operations SET status = ?1, finished_at = ?2, error_message = ?3
         WHERE id = ?4",
        libsql::params![ImportStatus::Failed.as_str(), now.to_rfc3339(), message, id],
    )
    .await?;

    let mut update = ImportOperationUpdate::new(id);
    update.status = Some(ImportStatus::Failed);
    update.finished_at = Some(now);
    update.error_message = Some(message.to_string());
    Ok(update)
}

async fn transition(
    conn: &libsql::Connection,
    id: &str,
    next: ImportStatus,
) -> Result<(), DatabaseError> {
    let current = get(conn, id).await?.status;
    if !current.can_transition_to(next) {
        return Err(CoreError::InvalidTransition {
            entity_type: "Import operation",
            id: id.to_string(),
            from: current.to_string(),
            to: next.to_string(),
        }
        .into());
    }
    Ok(())
}
