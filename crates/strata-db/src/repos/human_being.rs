//! Version chain store for human beings.
//!
//! A chain is a singly linked list through `next_version_id`, with
//! `version_root_id` on every non-root node pointing straight at the first
//! node. Only the current (last) node of a chain holds its natural key in the
//! partial unique index, so every edit below orders its statements to vacate
//! that slot before another row claims it. Foreign keys on both link columns
//! are deferred to commit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use strata_core::CoreError;
use strata_core::entities::{Coordinates, HumanBeing};
use strata_core::records::{CandidateRecord, CarRef, check_text};

use crate::error::{DatabaseError, Violation};
use crate::helpers::{bool_param, get_opt_bool, parse_datetime, parse_enum, placeholders};
use crate::repos::car;

const SELECT_COLS: &str = "id, name, coord_x, coord_y, creation_date, real_hero, has_toothpick, \
     car_id, mood, impact_speed, soundtrack_name, minutes_of_waiting, weapon_type, version, \
     next_version_id, version_root_id";

const COLUMN_COUNT: usize = 16;

/// Keep every statement well under `SQLite`'s bound-parameter limit.
const MAX_PARAMS: usize = 30_000;

fn get_i32(row: &libsql::Row, idx: i32) -> Result<i32, DatabaseError> {
    let v = row.get::<i64>(idx)?;
    i32::try_from(v).map_err(|_| DatabaseError::InvalidState(format!("{v} overflows column {idx}")))
}

fn get_opt_i32(row: &libsql::Row, idx: i32) -> Result<Option<i32>, DatabaseError> {
    row.get::<Option<i64>>(idx)?
        .map(|v| {
            i32::try_from(v)
                .map_err(|_| DatabaseError::InvalidState(format!("{v} overflows column {idx}")))
        })
        .transpose()
}

fn row_to_human_being(row: &libsql::Row) -> Result<HumanBeing, DatabaseError> {
    let version = row.get::<i64>(13)?;
    Ok(HumanBeing {
        id: row.get(0)?,
        name: row.get(1)?,
        coordinates: Coordinates {
            x: row.get(2)?,
            y: get_i32(row, 3)?,
        },
        creation_date: parse_datetime(&row.get::<String>(4)?)?,
        real_hero: row.get::<i64>(5)? != 0,
        has_toothpick: get_opt_bool(row, 6)?,
        car_id: row.get(7)?,
        mood: parse_enum(&row.get::<String>(8)?)?,
        impact_speed: get_opt_i32(row, 9)?,
        soundtrack_name: row.get(10)?,
        minutes_of_waiting: get_opt_i32(row, 11)?,
        weapon_type: parse_enum(&row.get::<String>(12)?)?,
        version: u32::try_from(version)
            .map_err(|_| DatabaseError::InvalidState(format!("bad version {version}")))?,
        next_version_id: row.get(14)?,
        version_root_id: row.get(15)?,
    })
}

/// Build a fresh chain root from an import record. Links are set by the caller.
#[must_use]
pub fn row_from_candidate(
    id: i64,
    record: &CandidateRecord,
    car_id: Option<i64>,
    creation_date: DateTime<Utc>,
) -> HumanBeing {
    HumanBeing {
        id,
        name: record.name.clone(),
        coordinates: record.coordinates,
        creation_date,
        real_hero: record.real_hero,
        has_toothpick: record.has_toothpick,
        car_id,
        mood: record.mood,
        impact_speed: record.impact_speed,
        soundtrack_name: record.soundtrack_name.clone(),
        minutes_of_waiting: record.minutes_of_waiting,
        weapon_type: record.weapon_type,
        version: 0,
        next_version_id: None,
        version_root_id: None,
    }
}

async fn query_all(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<HumanBeing>, DatabaseError> {
    let mut rows = conn.query(sql, params).await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        out.push(row_to_human_being(&row)?);
    }
    Ok(out)
}

/// # Errors
///
/// [`CoreError::NotFound`] when no row has this id.
pub async fn get(conn: &libsql::Connection, id: i64) -> Result<HumanBeing, DatabaseError> {
    query_all(
        conn,
        &format!("SELECT {SELECT_COLS} FROM human_beings WHERE id = ?1"),
        [id],
    )
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| CoreError::not_found("Human being", id).into())
}

/// Current version holding `name`, if any.
pub async fn find_current_by_name(
    conn: &libsql::Connection,
    name: &str,
) -> Result<Option<HumanBeing>, DatabaseError> {
    Ok(query_all(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM human_beings
             WHERE name = ?1 AND next_version_id IS NULL"
        ),
        [name],
    )
    .await?
    .into_iter()
    .next())
}

/// Current versions for a set of names, keyed by name.
pub async fn find_current_by_names(
    conn: &libsql::Connection,
    names: &[String],
) -> Result<HashMap<String, HumanBeing>, DatabaseError> {
    let mut found = HashMap::with_capacity(names.len());
    for chunk in names.chunks(MAX_PARAMS) {
        let sql = format!(
            "SELECT {SELECT_COLS} FROM human_beings
             WHERE next_version_id IS NULL AND name IN ({})",
            placeholders(1, chunk.len())
        );
        let rows = query_all(conn, &sql, libsql::params_from_iter(chunk.iter().cloned())).await?;
        for row in rows {
            found.insert(row.name.clone(), row);
        }
    }
    Ok(found)
}

/// Every node of the chain containing `id`, ordered by version.
pub async fn chain(conn: &libsql::Connection, id: i64) -> Result<Vec<HumanBeing>, DatabaseError> {
    let root = get(conn, id).await?.chain_root();
    query_all(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM human_beings
             WHERE id = ?1 OR version_root_id = ?1
             ORDER BY version, id"
        ),
        [root],
    )
    .await
}

/// Next free primary key. Only meaningful while holding the write lock.
pub async fn next_id(conn: &libsql::Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(id), 0) + 1 FROM human_beings", ())
        .await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<i64>(0)?)
}

/// Insert fully-formed rows (ids and links already assigned), in order.
pub async fn insert_rows(
    conn: &libsql::Connection,
    rows: &[HumanBeing],
) -> Result<(), DatabaseError> {
    for chunk in rows.chunks(MAX_PARAMS / COLUMN_COUNT) {
        let values = (0..chunk.len())
            .map(|i| format!("({})", placeholders(i * COLUMN_COUNT + 1, COLUMN_COUNT)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<libsql::Value> = Vec::with_capacity(chunk.len() * COLUMN_COUNT);
        for hb in chunk {
            params.extend([
                hb.id.into(),
                hb.name.clone().into(),
                hb.coordinates.x.into(),
                hb.coordinates.y.into(),
                hb.creation_date.to_rfc3339().into(),
                i64::from(hb.real_hero).into(),
                bool_param(hb.has_toothpick),
                hb.car_id.into(),
                hb.mood.as_str().into(),
                hb.impact_speed.into(),
                hb.soundtrack_name.clone().into(),
                hb.minutes_of_waiting.into(),
                hb.weapon_type.as_str().into(),
                i64::from(hb.version).into(),
                hb.next_version_id.into(),
                hb.version_root_id.into(),
            ]);
        }
        conn.execute(
            &format!("INSERT INTO human_beings ({SELECT_COLS}) VALUES {values}"),
            libsql::params_from_iter(params),
        )
        .await?;
    }
    Ok(())
}

/// Point each `(id, next)` pair's `next_version_id` at `next`.
pub async fn set_next_versions(
    conn: &libsql::Connection,
    links: &[(i64, i64)],
) -> Result<(), DatabaseError> {
    for chunk in links.chunks(MAX_PARAMS / 3) {
        let cases = (0..chunk.len())
            .map(|i| format!("WHEN ?{} THEN ?{}", i * 2 + 1, i * 2 + 2))
            .collect::<Vec<_>>()
            .join(" ");
        let ids = placeholders(chunk.len() * 2 + 1, chunk.len());
        let mut params: Vec<libsql::Value> = Vec::with_capacity(chunk.len() * 3);
        for (id, next) in chunk {
            params.push((*id).into());
            params.push((*next).into());
        }
        params.extend(chunk.iter().map(|(id, _)| libsql::Value::from(*id)));
        conn.execute(
            &format!(
                "UPDATE human_beings SET next_version_id = CASE id {cases} END
                 WHERE id IN ({ids})"
            ),
            libsql::params_from_iter(params),
        )
        .await?;
    }
    Ok(())
}

/// Create a single entity as a new chain root.
///
/// # Errors
///
/// [`Violation::NameTaken`] if a current version already holds the name,
/// [`Violation::MissingCars`] for an unknown car id,
/// [`Violation::CarNamesTaken`] for an embedded car whose name is used.
pub async fn create(
    conn: &libsql::Connection,
    record: &CandidateRecord,
) -> Result<HumanBeing, DatabaseError> {
    record.validate()?;
    if find_current_by_name(conn, &record.name).await?.is_some() {
        return Err(Violation::NameTaken(record.name.clone()).into());
    }
    let car_id = match &record.car {
        Some(CarRef::Id(id)) => {
            if !car::exists_by_id(conn, *id).await? {
                return Err(Violation::MissingCars(vec![*id]).into());
            }
            Some(*id)
        }
        Some(CarRef::Definition(def)) => Some(car::create(conn, def).await?.id),
        None => None,
    };
    let row = row_from_candidate(next_id(conn).await?, record, car_id, Utc::now());
    insert_rows(conn, std::slice::from_ref(&row)).await?;
    Ok(row)
}

/// Repair the chain around `node` so no other row references it.
///
/// `node` is the row as it was before the caller vacated it (deleted it or
/// moved it to another name); only other rows are touched here. The
/// predecessor is relinked to the successor, and if `node` was the root its
/// successor is promoted and every descendant re-pointed to it. Must run
/// inside the caller's transaction.
pub async fn detach(conn: &libsql::Connection, node: &HumanBeing) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE human_beings SET next_version_id = ?1
         WHERE next_version_id = ?2 AND id != ?2",
        libsql::params![node.next_version_id, node.id],
    )
    .await?;

    if let (None, Some(successor)) = (node.version_root_id, node.next_version_id) {
        conn.execute(
            "UPDATE human_beings SET version_root_id = ?1
             WHERE version_root_id = ?2 AND id != ?1",
            libsql::params![successor, node.id],
        )
        .await?;
        conn.execute(
            "UPDATE human_beings SET version_root_id = NULL WHERE id = ?1",
            [successor],
        )
        .await?;
        tracing::debug!(node = node.id, successor, "promoted successor to chain root");
    }
    Ok(())
}

/// Remove a node and repair its chain. Returns the removed row.
pub async fn delete(conn: &libsql::Connection, id: i64) -> Result<HumanBeing, DatabaseError> {
    let node = get(conn, id).await?;
    conn.execute("DELETE FROM human_beings WHERE id = ?1", [id])
        .await?;
    detach(conn, &node).await?;
    Ok(node)
}

/// Change a node's natural key, moving it out of its chain into a new one.
///
/// The node becomes a root (`version = 0`, no links). Its old chain is
/// repaired as for a deletion, so if the node was current its predecessor
/// becomes current under the old name. Renaming to the same name is a no-op.
///
/// # Errors
///
/// [`Violation::NameTaken`] if a current version already holds `new_name`.
pub async fn rename(
    conn: &libsql::Connection,
    id: i64,
    new_name: &str,
) -> Result<HumanBeing, DatabaseError> {
    check_text("name", new_name)?;
    let node = get(conn, id).await?;
    if node.name == new_name {
        return Ok(node);
    }
    if find_current_by_name(conn, new_name).await?.is_some() {
        return Err(Violation::NameTaken(new_name.to_string()).into());
    }

    conn.execute(
        "UPDATE human_beings
         SET name = ?1, version = 0, next_version_id = NULL, version_root_id = NULL
         WHERE id = ?2",
        libsql::params![new_name, id],
    )
    .await?;
    detach(conn, &node).await?;

    get(conn, id).await
}
