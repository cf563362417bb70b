use std::collections::BTreeMap;

use adrecon_core::token::{EXPIRY_BUFFER_SECS, TokenCache};
use adrecon_types::Network;

fn temp_cache() -> (tempfile::TempDir, TokenCache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = TokenCache::new(dir.path());
    (dir, cache)
}

#[tokio::test]
async fn missing_token_is_absent_not_error() {
    let (_dir, cache) = temp_cache();
    assert!(cache.get(Network::Moloco).await.unwrap().is_none());
}

#[tokio::test]
async fn put_then_get_round_trips_with_buffer() {
    let (_dir, cache) = temp_cache();
    let mut extras = BTreeMap::new();
    extras.insert("scope".to_string(), serde_json::json!("reporting"));

    let written = cache
        .put(Network::DtExchange, "tok-123", 3600, "Bearer", extras)
        .await
        .unwrap();

    // Buffered expiry: 3600 - 60 seconds out, within a small slack.
    let remaining = written.remaining().unwrap().as_secs();
    assert!(remaining <= 3600 - EXPIRY_BUFFER_SECS);
    assert!(remaining >= 3600 - EXPIRY_BUFFER_SECS - 5);

    let read = cache.get(Network::DtExchange).await.unwrap().unwrap();
    assert_eq!(read.token, "tok-123");
    assert_eq!(read.token_type, "Bearer");
    assert_eq!(read.network, "dt_exchange");
    assert_eq!(read.extras.get("scope"), Some(&serde_json::json!("reporting")));
}

#[tokio::test]
async fn tiny_lifetime_is_floored_to_buffer() {
    let (_dir, cache) = temp_cache();
    let written = cache
        .put(Network::Moloco, "t", 10, "Bearer", BTreeMap::new())
        .await
        .unwrap();
    let remaining = written.remaining().unwrap().as_secs();
    assert!(remaining >= EXPIRY_BUFFER_SECS - 5 && remaining <= EXPIRY_BUFFER_SECS);
}

#[tokio::test]
async fn expired_record_is_purged_on_read() {
    let (dir, cache) = temp_cache();
    let path = dir.path().join("inmobi_token.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "token": "stale",
            "token_type": "Bearer",
            "expires_at": 1_000_000,
            "created_at": 999_000,
            "network": "inmobi"
        })
        .to_string(),
    )
    .unwrap();

    assert!(cache.get(Network::Inmobi).await.unwrap().is_none());
    assert!(!path.exists(), "expired file should be deleted");
}

#[tokio::test]
async fn corrupt_record_is_purged_on_read() {
    let (dir, cache) = temp_cache();
    let path = dir.path().join("pangle_token.json");
    std::fs::write(&path, b"{not json").unwrap();

    assert!(cache.get(Network::Pangle).await.unwrap().is_none());
    assert!(!path.exists(), "corrupt file should be deleted");
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (_dir, cache) = temp_cache();
    cache.delete(Network::Unity).await.unwrap();
    cache
        .put(Network::Unity, "t", 600, "Bearer", BTreeMap::new())
        .await
        .unwrap();
    cache.delete(Network::Unity).await.unwrap();
    cache.delete(Network::Unity).await.unwrap();
    assert!(cache.get(Network::Unity).await.unwrap().is_none());
}

#[tokio::test]
async fn list_and_clear_all() {
    let (_dir, cache) = temp_cache();
    for network in [Network::Moloco, Network::Chartboost, Network::DtExchange] {
        cache
            .put(network, "t", 600, "Bearer", BTreeMap::new())
            .await
            .unwrap();
    }

    let listed = cache.list().await.unwrap();
    assert_eq!(listed, vec!["chartboost", "dt_exchange", "moloco"]);

    assert_eq!(cache.clear_all().await.unwrap(), 3);
    assert!(cache.list().await.unwrap().is_empty());
    assert!(cache.get(Network::Moloco).await.unwrap().is_none());
}

#[tokio::test]
async fn no_stray_temp_files_after_write() {
    let (dir, cache) = temp_cache();
    cache
        .put(Network::Meta, "t", 600, "Bearer", BTreeMap::new())
        .await
        .unwrap();
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["meta_token.json"]);
}
