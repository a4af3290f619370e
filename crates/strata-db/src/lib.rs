//! # strata-db
//!
//! libSQL persistence for Strata.
//!
//! Holds the import operation registry, the versioned `human_beings` store
//! with its chain repair operations, the car collaborator, and the batch merge
//! engine that folds parsed import records into version chains inside one
//! transaction.
//!
//! Uses the `libsql` crate (C `SQLite` fork, v0.9.29) in local mode. File
//! databases run in WAL mode and every writer gets its own connection, so
//! concurrent imports contend on SQLite's write lock and retry on conflict.

pub mod chain;
pub mod error;
pub mod helpers;
pub mod merge;
mod migrations;
pub mod repos;
pub mod retry;

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use error::DatabaseError;
use libsql::Builder;
use strata_config::DatabaseConfig;
use tokio::sync::{Mutex, OwnedMutexGuard};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Central database handle.
///
/// The shared connection serves reads. Writes go through [`StrataDb::session`].
///
/// `:memory:` databases are for tests and throwaway runs. They have a single
/// connection, so sessions take turns behind a gate (a writer waits for any
/// in-flight import to finish) and reads through [`StrataDb::conn`] see the
/// uncommitted state of whichever session holds the gate.
pub struct StrataDb {
    db: libsql::Database,
    conn: libsql::Connection,
    busy_timeout_ms: u64,
    /// Present for `:memory:` databases, which only have the one connection.
    write_gate: Option<Arc<Mutex<()>>>,
}

/// A connection dedicated to one unit of write work.
///
/// For in-memory databases this is the shared connection plus exclusive
/// access to it until the session is dropped.
pub struct DbSession {
    conn: libsql::Connection,
    _gate: Option<OwnedMutexGuard<()>>,
}

impl Deref for DbSession {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl StrataDb {
    /// Open the database described by `config`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Self::open_with_timeout(&config.path, config.busy_timeout_ms).await
    }

    /// Open a local database at the given path. Runs migrations on every open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    async fn open_with_timeout(path: &str, busy_timeout_ms: u64) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        if !in_memory {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    DatabaseError::Other(anyhow::anyhow!("create {}: {e}", parent.display()))
                })?;
            }
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        configure(&conn, busy_timeout_ms, !in_memory).await?;

        let strata_db = Self {
            db,
            conn,
            busy_timeout_ms,
            write_gate: in_memory.then(|| Arc::new(Mutex::new(()))),
        };
        strata_db.run_migrations().await?;
        tracing::debug!(path, "database opened");
        Ok(strata_db)
    }

    /// The shared connection, for reads.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// A connection for one write unit (transaction plus follow-up writes).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a new connection cannot be opened.
    pub async fn session(&self) -> Result<DbSession, DatabaseError> {
        if let Some(gate) = &self.write_gate {
            let guard = Arc::clone(gate).lock_owned().await;
            return Ok(DbSession {
                conn: self.conn.clone(),
                _gate: Some(guard),
            });
        }
        let conn = self.db.connect()?;
        configure(&conn, self.busy_timeout_ms, true).await?;
        Ok(DbSession { conn, _gate: None })
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"imp-a3f8b2c1"`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        helpers::generate_id(&self.conn, prefix).await
    }
}

/// Per-connection settings. Foreign keys must be enabled on every connection.
async fn configure(
    conn: &libsql::Connection,
    busy_timeout_ms: u64,
    file_backed: bool,
) -> Result<(), DatabaseError> {
    conn.execute("PRAGMA foreign_keys = ON", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;
    if file_backed {
        // Both pragmas report their new value as a row, so they must be stepped.
        pragma_query(conn, &format!("PRAGMA busy_timeout = {busy_timeout_ms}")).await?;
        pragma_query(conn, "PRAGMA journal_mode = WAL").await?;
    }
    Ok(())
}

async fn pragma_query(conn: &libsql::Connection, sql: &str) -> Result<(), DatabaseError> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("{sql}: {e}")))?;
    rows.next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("{sql}: {e}")))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use strata_core::entities::NewCar;
    use strata_core::enums::{Mood, WeaponType};
    use strata_core::records::{CandidateRecord, CarRef};

    use crate::StrataDb;

    pub async fn test_db() -> StrataDb {
        StrataDb::open_local(":memory:").await.unwrap()
    }

    pub fn candidate(name: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.to_string(),
            coordinates: strata_core::entities::Coordinates { x: 1.0, y: 2 },
            real_hero: true,
            has_toothpick: None,
            car: None,
            mood: Mood::Calm,
            impact_speed: Some(10),
            soundtrack_name: "Theme".to_string(),
            minutes_of_waiting: None,
            weapon_type: WeaponType::Hammer,
        }
    }

    pub fn with_car_id(name: &str, id: i64) -> CandidateRecord {
        CandidateRecord {
            car: Some(CarRef::Id(id)),
            ..candidate(name)
        }
    }

    pub fn with_new_car(name: &str, car: &str) -> CandidateRecord {
        CandidateRecord {
            car: Some(CarRef::Definition(NewCar {
                name: car.to_string(),
                cool: Some(true),
            })),
            ..candidate(name)
        }
    }
}
