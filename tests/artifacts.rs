//! Artifact store: persistence, MIME detection, listings, and stats.

use iosans::artifact::ArtifactStore;

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x01, 0x02];

#[tokio::test]
async fn save_then_get_round_trips_the_blob() {
    let store = ArtifactStore::in_memory().await.unwrap();
    let id = store.save(PNG_MAGIC.to_vec(), "image", None).await.unwrap();

    let artifact = store.get(&id).await.unwrap().unwrap();
    assert_eq!(artifact.blob, PNG_MAGIC);
    assert_eq!(artifact.metadata.mime_type, "image/png");
    assert_eq!(artifact.metadata.category, "image");
    assert_eq!(artifact.metadata.size, PNG_MAGIC.len() as u64);
}

#[tokio::test]
async fn empty_blobs_are_rejected() {
    let store = ArtifactStore::in_memory().await.unwrap();
    assert!(store.save(Vec::new(), "data", None).await.is_err());
}

#[tokio::test]
async fn hint_applies_when_magic_bytes_fail() {
    let store = ArtifactStore::in_memory().await.unwrap();
    let id = store
        .save(b"{\"k\":1}".to_vec(), "data", Some("application/json"))
        .await
        .unwrap();
    let artifact = store.get(&id).await.unwrap().unwrap();
    assert_eq!(artifact.metadata.mime_type, "application/json");

    let id = store.save(b"mystery".to_vec(), "data", None).await.unwrap();
    let artifact = store.get(&id).await.unwrap().unwrap();
    assert_eq!(artifact.metadata.mime_type, "application/octet-stream");
}

#[tokio::test]
async fn list_filters_by_category_without_blobs() {
    let store = ArtifactStore::in_memory().await.unwrap();
    store.save(PNG_MAGIC.to_vec(), "image", None).await.unwrap();
    store.save(b"abc".to_vec(), "data", None).await.unwrap();
    store.save(b"def".to_vec(), "data", None).await.unwrap();

    assert_eq!(store.list(None).await.unwrap().len(), 3);
    let data_only = store.list(Some("data")).await.unwrap();
    assert_eq!(data_only.len(), 2);
    assert!(data_only.iter().all(|m| m.category == "data"));
    assert!(store.list(Some("audio")).await.unwrap().is_empty());
}

#[tokio::test]
async fn stats_and_clear_all() {
    let store = ArtifactStore::in_memory().await.unwrap();
    store.save(b"12345".to_vec(), "data", None).await.unwrap();
    store.save(b"123".to_vec(), "data", None).await.unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_size, 8);

    store.clear_all().await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.count, 0);
    assert_eq!(stats.total_size, 0);
}

#[tokio::test]
async fn delete_reports_absence() {
    let store = ArtifactStore::in_memory().await.unwrap();
    let id = store.save(b"abc".to_vec(), "data", None).await.unwrap();
    assert!(store.delete(&id).await.unwrap());
    assert!(!store.delete(&id).await.unwrap());
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn ids_are_unique_and_stable() {
    let store = ArtifactStore::in_memory().await.unwrap();
    let first = store.save(b"same".to_vec(), "data", None).await.unwrap();
    let second = store.save(b"same".to_vec(), "data", None).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(store.get(&first).await.unwrap().unwrap().metadata.id, first);
}
