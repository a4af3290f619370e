//! Imports contending for the write lock of a file-backed database.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use strata_config::{StorageBackend, StrataConfig};
use strata_core::enums::ImportStatus;
use strata_db::repos::human_being;
use strata_import::{ImportError, ImportService};

fn people(names: &[&str]) -> Vec<u8> {
    let items: Vec<_> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "coordinates": {"x": 0.5, "y": 1},
                "realHero": false,
                "mood": "LONGING",
                "soundtrackName": "Rain",
                "weaponType": "SHOTGUN"
            })
        })
        .collect();
    serde_json::to_vec(&items).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_imports_both_commit_with_one_chain() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StrataConfig::default();
    config.database.path = dir.path().join("strata.db").to_string_lossy().into_owned();
    config.database.busy_timeout_ms = 1;
    config.storage.backend = StorageBackend::Memory;
    config.retry.max_attempts = 100;
    config.retry.base_delay_ms = 5;
    config.retry.max_delay_ms = 40;
    let service = ImportService::open(&config).await.unwrap();

    let first = service
        .submit("one.json", people(&["Trinity", "Switch"]), "application/json")
        .await
        .unwrap();
    let second = service
        .submit("two.json", people(&["Trinity", "Apoc"]), "application/json")
        .await
        .unwrap();
    let (a, b) = tokio::join!(first.wait(), second.wait());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.ok_count.unwrap() + b.ok_count.unwrap(), 3);
    assert_eq!(a.duplicate_count.unwrap() + b.duplicate_count.unwrap(), 1);

    let trinity = human_being::find_current_by_name(service.db().conn(), "Trinity")
        .await
        .unwrap()
        .unwrap();
    let chain = service.db().versions(trinity.id).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1].version, 1);
    assert_eq!(chain[1].version_root_id, Some(chain[0].id));
}

/// Another writer holds the lock longer than the retry policy allows, then
/// lets go so the failure can be recorded.
#[tokio::test]
async fn exhausted_conflict_retries_fail_the_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strata.db");
    let mut config = StrataConfig::default();
    config.database.path = path.to_string_lossy().into_owned();
    config.database.busy_timeout_ms = 1;
    config.storage.backend = StorageBackend::Memory;
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 200;
    config.retry.max_delay_ms = 200;
    config.retry.jitter = 0.0;
    let service = ImportService::open(&config).await.unwrap();

    let other = libsql::Builder::new_local(&path).build().await.unwrap();
    let blocker = other.connect().unwrap();

    let ticket = service
        .submit("one.json", people(&["Niobe"]), "application/json")
        .await
        .unwrap();
    let id = ticket.operation.id.clone();
    // Single-threaded runtime: the import task has not run yet.
    blocker.execute("BEGIN IMMEDIATE", ()).await.unwrap();

    let release = async {
        // Past the last attempt at IN_PROGRESS, before the FAILED write gives up.
        tokio::time::sleep(Duration::from_millis(500)).await;
        blocker.execute("COMMIT", ()).await.unwrap();
    };
    let (result, ()) = tokio::join!(ticket.wait(), release);

    assert!(
        matches!(result, Err(ImportError::Conflict { attempts: 3 })),
        "{result:?}"
    );
    let op = service.get(&id).await.unwrap();
    assert_eq!(op.status, ImportStatus::Failed);
    assert_eq!(
        op.error_message.as_deref(),
        Some("Import conflicted with concurrent imports; please resubmit the file")
    );
    assert_eq!(op.started_at, None);
    assert!(
        human_being::find_current_by_name(service.db().conn(), "Niobe")
            .await
            .unwrap()
            .is_none()
    );
}
