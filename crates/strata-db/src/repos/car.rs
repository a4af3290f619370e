//! Car collaborator: single-row CRUD plus the batch helpers used by the merge.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use strata_core::entities::{Car, NewCar};

use crate::error::{DatabaseError, Violation};
use crate::helpers::{bool_param, get_opt_bool, placeholders};

/// Keep every statement well under `SQLite`'s bound-parameter limit.
const MAX_PARAMS: usize = 30_000;

fn row_to_car(row: &libsql::Row) -> Result<Car, DatabaseError> {
    Ok(Car {
        id: row.get(0)?,
        name: row.get(1)?,
        cool: get_opt_bool(row, 2)?,
    })
}

/// # Errors
///
/// [`Violation::CarNamesTaken`] when the name is already used.
pub async fn create(conn: &libsql::Connection, car: &NewCar) -> Result<Car, DatabaseError> {
    car.validate()?;
    let taken = taken_names(conn, std::slice::from_ref(&car.name)).await?;
    if !taken.is_empty() {
        return Err(Violation::CarNamesTaken(taken).into());
    }
    conn.execute(
        "INSERT INTO cars (name, cool) VALUES (?1, ?2)",
        libsql::params![car.name.as_str(), bool_param(car.cool)],
    )
    .await?;
    Ok(Car {
        id: conn.last_insert_rowid(),
        name: car.name.clone(),
        cool: car.cool,
    })
}

pub async fn find_by_id(conn: &libsql::Connection, id: i64) -> Result<Option<Car>, DatabaseError> {
    let mut rows = conn
        .query("SELECT id, name, cool FROM cars WHERE id = ?1", [id])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_car(&row)?)),
        None => Ok(None),
    }
}

pub async fn exists_by_id(conn: &libsql::Connection, id: i64) -> Result<bool, DatabaseError> {
    let mut rows = conn.query("SELECT 1 FROM cars WHERE id = ?1", [id]).await?;
    Ok(rows.next().await?.is_some())
}

/// Ids from `ids` with no car row, ascending.
pub async fn missing_ids(
    conn: &libsql::Connection,
    ids: &BTreeSet<i64>,
) -> Result<Vec<i64>, DatabaseError> {
    let wanted: Vec<i64> = ids.iter().copied().collect();
    let mut found = BTreeSet::new();
    for chunk in wanted.chunks(MAX_PARAMS) {
        let sql = format!(
            "SELECT id FROM cars WHERE id IN ({})",
            placeholders(1, chunk.len())
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(chunk.iter().copied()))
            .await?;
        while let Some(row) = rows.next().await? {
            found.insert(row.get::<i64>(0)?);
        }
    }
    Ok(wanted.into_iter().filter(|id| !found.contains(id)).collect())
}

/// Names from `names` already used by a car, sorted.
pub async fn taken_names(
    conn: &libsql::Connection,
    names: &[String],
) -> Result<Vec<String>, DatabaseError> {
    let mut taken = BTreeSet::new();
    for chunk in names.chunks(MAX_PARAMS) {
        let sql = format!(
            "SELECT name FROM cars WHERE name IN ({})",
            placeholders(1, chunk.len())
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(chunk.iter().cloned()))
            .await?;
        while let Some(row) = rows.next().await? {
            taken.insert(row.get::<String>(0)?);
        }
    }
    Ok(taken.into_iter().collect())
}

/// Insert `cars` in multi-row statements of at most `chunk_size` rows.
///
/// Ids are allocated here from the current maximum, so the caller must hold
/// the write lock (an IMMEDIATE transaction). Returns name → id.
pub async fn insert_batch(
    conn: &libsql::Connection,
    cars: &BTreeMap<String, NewCar>,
    chunk_size: usize,
) -> Result<HashMap<String, i64>, DatabaseError> {
    let mut next_id = next_id(conn).await?;
    let mut ids = HashMap::with_capacity(cars.len());
    let rows: Vec<(i64, &NewCar)> = cars
        .values()
        .map(|car| {
            let id = next_id;
            next_id += 1;
            ids.insert(car.name.clone(), id);
            (id, car)
        })
        .collect();

    let per_statement = chunk_size.clamp(1, MAX_PARAMS / 3);
    for chunk in rows.chunks(per_statement) {
        let values = (0..chunk.len())
            .map(|i| format!("(?{}, ?{}, ?{})", i * 3 + 1, i * 3 + 2, i * 3 + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<libsql::Value> = Vec::with_capacity(chunk.len() * 3);
        for (id, car) in chunk {
            params.push((*id).into());
            params.push(car.name.clone().into());
            params.push(bool_param(car.cool));
        }
        conn.execute(
            &format!("INSERT INTO cars (id, name, cool) VALUES {values}"),
            libsql::params_from_iter(params),
        )
        .await?;
        tracing::debug!(rows = chunk.len(), "flushed car chunk");
    }
    Ok(ids)
}

async fn next_id(conn: &libsql::Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(id), 0) + 1 FROM cars", ())
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<i64>(0)?)
}
