//! Two writers racing on the same natural key over a file-backed database.

use std::sync::Arc;
use std::time::Duration;

use libsql::TransactionBehavior;
use strata_config::DatabaseConfig;
use strata_core::entities::Coordinates;
use strata_core::enums::{Mood, WeaponType};
use strata_core::records::CandidateRecord;
use strata_db::StrataDb;
use strata_db::error::DatabaseError;
use strata_db::merge::{MergeOutcome, merge};
use strata_db::repos::human_being;
use strata_db::retry::{RetryConfig, with_conflict_retry};

fn candidate(name: &str) -> CandidateRecord {
    CandidateRecord {
        name: name.to_string(),
        coordinates: Coordinates { x: 0.0, y: 0 },
        real_hero: false,
        has_toothpick: None,
        car: None,
        mood: Mood::Apathy,
        impact_speed: None,
        soundtrack_name: "Loop".to_string(),
        minutes_of_waiting: None,
        weapon_type: WeaponType::Rifle,
    }
}

async fn merge_with_retry(
    db: Arc<StrataDb>,
    batch: Vec<CandidateRecord>,
) -> Result<MergeOutcome, DatabaseError> {
    let retry = RetryConfig {
        max_attempts: 50,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(40),
        jitter: 0.5,
    };
    with_conflict_retry(&retry, "test merge", |_| {
        let db = Arc::clone(&db);
        let batch = batch.clone();
        async move {
            let session = db.session().await?;
            let tx = session
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await?;
            let outcome = merge(&tx, &batch, 100).await?;
            // hold the write lock long enough for the other writer to collide
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.commit().await?;
            Ok(outcome)
        }
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_batches_produce_one_root_and_one_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("race.db").to_string_lossy().into_owned(),
        busy_timeout_ms: 1,
    };
    let db = Arc::new(StrataDb::open(&config).await.unwrap());

    let a = tokio::spawn(merge_with_retry(Arc::clone(&db), vec![candidate("Trinity")]));
    let b = tokio::spawn(merge_with_retry(Arc::clone(&db), vec![candidate("Trinity")]));
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a.ok_count + b.ok_count, 1);
    assert_eq!(a.duplicate_count + b.duplicate_count, 1);

    let current = human_being::find_current_by_name(db.conn(), "Trinity")
        .await
        .unwrap()
        .unwrap();
    let chain = human_being::chain(db.conn(), current.id).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].version_root_id, None);
    assert_eq!(chain[1].version_root_id, Some(chain[0].id));
    assert_eq!(chain[0].next_version_id, Some(chain[1].id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn held_lock_surfaces_conflict_without_retries() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("locked.db").to_string_lossy().into_owned(),
        busy_timeout_ms: 1,
    };
    let db = StrataDb::open(&config).await.unwrap();

    let holder = db.session().await.unwrap();
    let tx = holder
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .await
        .unwrap();

    let err = db
        .create_human_being(&candidate("Morpheus"), &RetryConfig::no_retry())
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict { attempts: 1, .. }), "{err}");

    tx.rollback().await.unwrap();
    db.create_human_being(&candidate("Morpheus"), &RetryConfig::no_retry())
        .await
        .unwrap();
}
