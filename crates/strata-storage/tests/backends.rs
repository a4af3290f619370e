//! Local filesystem and S3 backends, exercised without network access.

use std::sync::Arc;
use std::time::Duration;

use object_store::local::LocalFileSystem;
use strata_config::{StorageBackend, StorageConfig};
use strata_storage::{ImportFileStorage, StorageError};

#[tokio::test]
async fn local_backend_writes_under_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("objects");
    let config = StorageConfig {
        backend: StorageBackend::Local,
        local_root: root.to_string_lossy().into_owned(),
        ..StorageConfig::default()
    };
    let storage = ImportFileStorage::from_config(&config).await.unwrap();
    storage
        .upload("people.yaml", b"- name: Neo\n".to_vec(), "application/yaml")
        .await
        .unwrap();

    let on_disk = root.join("imports").join("people.yaml");
    assert_eq!(std::fs::read(&on_disk).unwrap(), b"- name: Neo\n");

    let url = storage
        .download_url("people.yaml", Duration::from_secs(60))
        .await
        .unwrap();
    assert!(url.starts_with("file://"), "{url}");
    assert!(url.ends_with("imports/people.yaml"), "{url}");

    storage.delete("people.yaml").await.unwrap();
    assert!(!on_disk.exists());
}

#[tokio::test]
async fn upload_into_unwritable_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let store = LocalFileSystem::new_with_prefix(&blocker).unwrap();
    let storage = ImportFileStorage::with_store(Arc::new(store), "imports");

    let err = storage
        .upload("x.json", b"[]".to_vec(), "application/json")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ObjectStore(_)), "{err}");
}

#[tokio::test]
async fn s3_signs_download_urls_offline() {
    let config = StorageConfig {
        backend: StorageBackend::S3,
        bucket: "strata-test".into(),
        region: "eu-west-1".into(),
        endpoint: "http://127.0.0.1:9000".into(),
        access_key_id: "AKIDEXAMPLE".into(),
        secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
        allow_http: true,
        ..StorageConfig::default()
    };
    let storage = ImportFileStorage::from_config(&config).await.unwrap();
    assert_eq!(storage.backend(), "s3");

    let url = storage
        .download_url("abc.json", Duration::from_secs(900))
        .await
        .unwrap();
    assert!(url.contains("imports/abc.json"), "{url}");
    assert!(url.contains("X-Amz-Signature="), "{url}");
    assert!(url.contains("X-Amz-Expires=900"), "{url}");
}
