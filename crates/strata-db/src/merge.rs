//! Batch merge engine.
//!
//! Folds a batch of candidate records into the version chains inside the
//! caller's open transaction, which must hold the write lock (IMMEDIATE) since
//! primary keys are allocated in memory from the current maximum.
//!
//! Candidates are processed in input order. A candidate whose name matches a
//! current version becomes that version's successor; anything else starts a
//! new chain. Rows are buffered and flushed every `chunk_size` pending writes:
//! link updates on already-written rows go first, then inserts. A superseded
//! row still sitting in the buffer is linked in place instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use serde::Serialize;
use strata_core::entities::{HumanBeing, NewCar};
use strata_core::records::{CandidateRecord, CarRef};

use crate::error::{DatabaseError, Violation};
use crate::repos::{car, human_being};

/// Counts recorded on the import operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// New chains started.
    pub ok_count: u64,
    /// New versions appended to an existing chain.
    pub duplicate_count: u64,
}

/// Latest node of a chain as seen by the merge so far.
#[derive(Debug, Clone, Copy)]
struct ChainHead {
    id: i64,
    version: u32,
    root: i64,
}

impl From<&HumanBeing> for ChainHead {
    fn from(hb: &HumanBeing) -> Self {
        Self {
            id: hb.id,
            version: hb.version,
            root: hb.chain_root(),
        }
    }
}

#[derive(Default)]
struct PendingWrites {
    inserts: Vec<HumanBeing>,
    /// id → index in `inserts`.
    positions: HashMap<i64, usize>,
    links: Vec<(i64, i64)>,
}

impl PendingWrites {
    fn len(&self) -> usize {
        self.inserts.len() + self.links.len()
    }

    fn link(&mut self, from: i64, to: i64) {
        match self.positions.get(&from) {
            Some(&pos) => self.inserts[pos].next_version_id = Some(to),
            None => self.links.push((from, to)),
        }
    }

    fn push(&mut self, row: HumanBeing) {
        self.positions.insert(row.id, self.inserts.len());
        self.inserts.push(row);
    }

    async fn flush(&mut self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        if self.len() == 0 {
            return Ok(());
        }
        // Links first: superseded rows leave the current-name slot before the
        // new current versions are inserted.
        human_being::set_next_versions(conn, &self.links).await?;
        human_being::insert_rows(conn, &self.inserts).await?;
        tracing::debug!(
            inserts = self.inserts.len(),
            links = self.links.len(),
            "flushed human being chunk"
        );
        self.inserts.clear();
        self.positions.clear();
        self.links.clear();
        Ok(())
    }
}

/// Merge `candidates` into the store. Runs entirely inside the caller's transaction.
///
/// # Errors
///
/// A [`Violation`] for unknown car ids, taken or conflicting car names; the
/// caller must roll back. Database errors propagate unchanged.
pub async fn merge(
    conn: &libsql::Connection,
    candidates: &[CandidateRecord],
    chunk_size: usize,
) -> Result<MergeOutcome, DatabaseError> {
    let chunk_size = chunk_size.max(1);
    let car_ids = resolve_cars(conn, candidates, chunk_size).await?;

    let names: Vec<String> = candidates
        .iter()
        .map(|c| c.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut heads: HashMap<String, ChainHead> = human_being::find_current_by_names(conn, &names)
        .await?
        .iter()
        .map(|(name, hb)| (name.clone(), ChainHead::from(hb)))
        .collect();

    let mut next_id = human_being::next_id(conn).await?;
    let mut pending = PendingWrites::default();
    let mut outcome = MergeOutcome::default();
    let now = Utc::now();

    for record in candidates {
        let car_id = match &record.car {
            Some(CarRef::Id(id)) => Some(*id),
            Some(CarRef::Definition(def)) => car_ids.get(&def.name).copied(),
            None => None,
        };
        let mut row = human_being::row_from_candidate(next_id, record, car_id, now);
        next_id += 1;

        if let Some(head) = heads.get(&record.name).copied() {
            row.version = head.version + 1;
            row.version_root_id = Some(head.root);
            pending.link(head.id, row.id);
            outcome.duplicate_count += 1;
        } else {
            outcome.ok_count += 1;
        }

        heads.insert(record.name.clone(), ChainHead::from(&row));
        pending.push(row);

        if pending.len() >= chunk_size {
            pending.flush(conn).await?;
        }
    }
    pending.flush(conn).await?;

    tracing::info!(
        candidates = candidates.len(),
        ok = outcome.ok_count,
        duplicates = outcome.duplicate_count,
        "merge complete"
    );
    Ok(outcome)
}

/// Check car references and create embedded cars. Returns new car name → id.
async fn resolve_cars(
    conn: &libsql::Connection,
    candidates: &[CandidateRecord],
    chunk_size: usize,
) -> Result<HashMap<String, i64>, DatabaseError> {
    let mut by_id = BTreeSet::new();
    let mut definitions: BTreeMap<String, NewCar> = BTreeMap::new();
    for record in candidates {
        match &record.car {
            Some(CarRef::Id(id)) => {
                by_id.insert(*id);
            }
            Some(CarRef::Definition(def)) => match definitions.get(&def.name) {
                Some(existing) if existing != def => {
                    return Err(Violation::ConflictingCarDefinitions(def.name.clone()).into());
                }
                Some(_) => {}
                None => {
                    definitions.insert(def.name.clone(), def.clone());
                }
            },
            None => {}
        }
    }

    let missing = car::missing_ids(conn, &by_id).await?;
    if !missing.is_empty() {
        return Err(Violation::MissingCars(missing).into());
    }

    let names: Vec<String> = definitions.keys().cloned().collect();
    let taken = car::taken_names(conn, &names).await?;
    if !taken.is_empty() {
        return Err(Violation::CarNamesTaken(taken).into());
    }

    car::insert_batch(conn, &definitions, chunk_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrataDb;
    use crate::repos::human_being::{chain, find_current_by_name};
    use crate::test_support::{candidate, test_db, with_car_id, with_new_car};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    async fn merge_committed(
        db: &StrataDb,
        candidates: &[CandidateRecord],
        chunk_size: usize,
    ) -> Result<MergeOutcome, DatabaseError> {
        let tx = db
            .conn()
            .transaction_with_behavior(libsql::TransactionBehavior::Immediate)
            .await?;
        match merge(&tx, candidates, chunk_size).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn count(db: &StrataDb, table: &str) -> i64 {
        let mut rows = db
            .conn()
            .query(&format!("SELECT count(*) FROM {table}"), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    fn assert_chain_integrity(chain: &[HumanBeing]) {
        let root = chain[0].id;
        assert_eq!(chain[0].version_root_id, None);
        for (i, node) in chain.iter().enumerate() {
            assert_eq!(node.version, u32::try_from(i).unwrap());
            if i > 0 {
                assert_eq!(node.version_root_id, Some(root));
                assert_eq!(chain[i - 1].next_version_id, Some(node.id));
            }
        }
        assert_eq!(chain.iter().filter(|n| n.next_version_id.is_none()).count(), 1);
    }

    #[tokio::test]
    async fn alice_bob_alice() {
        let db = test_db().await;
        let outcome = merge_committed(
            &db,
            &[candidate("Alice"), candidate("Bob"), candidate("Alice")],
            1000,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            MergeOutcome {
                ok_count: 2,
                duplicate_count: 1
            }
        );
        assert_eq!(count(&db, "human_beings").await, 3);
        let alice = find_current_by_name(db.conn(), "Alice").await.unwrap().unwrap();
        assert_eq!(chain(db.conn(), alice.id).await.unwrap().len(), 2);
    }

    #[rstest]
    #[case::single_chunk(1000)]
    #[case::chunk_of_one(1)]
    #[case::odd_chunk(3)]
    #[tokio::test]
    async fn same_key_batch_forms_one_chain(#[case] chunk_size: usize) {
        let db = test_db().await;
        let batch: Vec<CandidateRecord> = (0..7)
            .map(|i| CandidateRecord {
                impact_speed: Some(i),
                ..candidate("Neo")
            })
            .collect();
        let outcome = merge_committed(&db, &batch, chunk_size).await.unwrap();
        assert_eq!(outcome.ok_count, 1);
        assert_eq!(outcome.duplicate_count, 6);

        let current = find_current_by_name(db.conn(), "Neo").await.unwrap().unwrap();
        let chain = chain(db.conn(), current.id).await.unwrap();
        assert_eq!(chain.len(), 7);
        assert_chain_integrity(&chain);
        // submission order defines version order
        let speeds: Vec<Option<i32>> = chain.iter().map(|n| n.impact_speed).collect();
        assert_eq!(speeds, (0..7).map(Some).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn second_batch_extends_existing_chain() {
        let db = test_db().await;
        merge_committed(&db, &[candidate("Alice")], 10).await.unwrap();
        let outcome = merge_committed(&db, &[candidate("Alice"), candidate("Alice")], 1)
            .await
            .unwrap();
        assert_eq!(outcome.ok_count, 0);
        assert_eq!(outcome.duplicate_count, 2);

        let current = find_current_by_name(db.conn(), "Alice").await.unwrap().unwrap();
        let chain = chain(db.conn(), current.id).await.unwrap();
        assert_eq!(chain.len(), 3);
        assert_chain_integrity(&chain);
    }

    #[tokio::test]
    async fn missing_car_fails_whole_batch() {
        let db = test_db().await;
        let err = merge_committed(&db, &[candidate("Alice"), with_car_id("Bob", 999)], 10)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid cars: 999");
        assert_eq!(count(&db, "human_beings").await, 0);
    }

    #[tokio::test]
    async fn embedded_cars_are_created_once_and_linked() {
        let db = test_db().await;
        merge_committed(
            &db,
            &[with_new_car("A", "Volga"), with_new_car("B", "Volga")],
            10,
        )
        .await
        .unwrap();
        assert_eq!(count(&db, "cars").await, 1);
        let a = find_current_by_name(db.conn(), "A").await.unwrap().unwrap();
        let b = find_current_by_name(db.conn(), "B").await.unwrap().unwrap();
        assert!(a.car_id.is_some());
        assert_eq!(a.car_id, b.car_id);
    }

    #[tokio::test]
    async fn taken_car_name_fails_batch() {
        let db = test_db().await;
        merge_committed(&db, &[with_new_car("A", "Volga")], 10)
            .await
            .unwrap();
        let err = merge_committed(&db, &[with_new_car("B", "Volga")], 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Violation(Violation::CarNamesTaken(ref names)) if names == &["Volga"]
        ));
        assert!(find_current_by_name(db.conn(), "B").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conflicting_car_definitions_fail_batch() {
        let db = test_db().await;
        let mut other = with_new_car("B", "Volga");
        if let Some(CarRef::Definition(def)) = other.car.as_mut() {
            def.cool = Some(false);
        }
        let err = merge_committed(&db, &[with_new_car("A", "Volga"), other], 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Violation(Violation::ConflictingCarDefinitions(_))
        ));
    }
}
