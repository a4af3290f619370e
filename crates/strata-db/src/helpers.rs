//! Row-to-entity parsing helpers.
//!
//! Timestamps are written with `to_rfc3339()`; `SQLite`'s `datetime('now')`
//! format is accepted too so hand-edited rows still load.

use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse a nullable TEXT column as `Option<DateTime<Utc>>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string cannot be parsed.
pub fn get_opt_datetime(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if !s.is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

/// Parse a TEXT column into a serde-deserializable enum.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any enum variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable INTEGER column holding a non-negative count.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` for negative values.
pub fn get_opt_count(row: &libsql::Row, idx: i32) -> Result<Option<u64>, DatabaseError> {
    row.get::<Option<i64>>(idx)?
        .map(|n| {
            u64::try_from(n)
                .map_err(|_| DatabaseError::InvalidState(format!("negative count {n} in column {idx}")))
        })
        .transpose()
}

/// Read a nullable INTEGER column as a boolean flag.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_bool(row: &libsql::Row, idx: i32) -> Result<Option<bool>, DatabaseError> {
    Ok(row.get::<Option<i64>>(idx)?.map(|v| v != 0))
}

/// Convert a count into the signed form `SQLite` stores.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` above `i64::MAX`.
pub fn count_param(n: u64) -> Result<i64, DatabaseError> {
    i64::try_from(n).map_err(|_| DatabaseError::InvalidState(format!("count {n} out of range")))
}

/// Convert an optional flag into the integer form `SQLite` stores.
pub fn bool_param(flag: Option<bool>) -> libsql::Value {
    flag.map_or(libsql::Value::Null, |b| libsql::Value::Integer(i64::from(b)))
}

/// `?n, ?n+1, ...` placeholders for an `IN (...)` list starting at `first`.
#[must_use]
pub fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Generate a prefixed ID via libSQL. Returns e.g., `"imp-a3f8b2c1"`.
///
/// # Errors
///
/// Returns `DatabaseError` if the query fails or returns no rows.
pub async fn generate_id(conn: &libsql::Connection, prefix: &str) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT ?1 || '-' || lower(hex(randomblob(4)))",
            [prefix],
        )
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::enums::ImportStatus;

    #[test]
    fn parses_both_datetime_formats() {
        let a = parse_datetime("2026-02-09T14:30:00+00:00").unwrap();
        let b = parse_datetime("2026-02-09 14:30:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn parses_snake_case_status() {
        let status: ImportStatus = parse_enum("in_progress").unwrap();
        assert_eq!(status, ImportStatus::InProgress);
        assert!(parse_enum::<ImportStatus>("IN_PROGRESS").is_err());
    }

    #[test]
    fn placeholders_are_numbered_from_first() {
        assert_eq!(placeholders(3, 3), "?3, ?4, ?5");
        assert_eq!(placeholders(1, 0), "");
    }
}
