use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteKeyValueStore;

#[tokio::test]
async fn sqlite_store_upserts_and_removes() {
    let store = SqliteKeyValueStore::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("migrate");

    assert_eq!(store.get("submissionData").await.unwrap(), None);

    store.set("submissionData", r#"{"score":3}"#).await.unwrap();
    store.set("submissionData", r#"{"score":4}"#).await.unwrap();
    assert_eq!(
        store.get("submissionData").await.unwrap().as_deref(),
        Some(r#"{"score":4}"#)
    );

    store.remove("submissionData").await.unwrap();
    assert_eq!(store.get("submissionData").await.unwrap(), None);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = SqliteKeyValueStore::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    store.migrate().await.expect("first migrate");
    store.migrate().await.expect("second migrate");

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn storage_bundle_uses_sqlite_backend() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_bundle?mode=memory&cache=shared")
        .await
        .expect("storage");
    storage
        .key_values
        .set("lastSubmittedAssessment", "3f2504e0-4f89-11d3-9a0c-0305e82c3301")
        .await
        .unwrap();
    assert!(
        storage
            .key_values
            .get("lastSubmittedAssessment")
            .await
            .unwrap()
            .is_some()
    );
}
