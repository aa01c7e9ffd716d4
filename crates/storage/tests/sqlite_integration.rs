use storage::repository::{KeyValueStore, Storage, TEST_SESSION_SLOT};
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_slot_roundtrip_and_overwrite() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slots?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert!(repo.get(TEST_SESSION_SLOT).await.unwrap().is_none());

    repo.set(TEST_SESSION_SLOT, r#"{"testId":"t1"}"#)
        .await
        .unwrap();
    repo.set(TEST_SESSION_SLOT, r#"{"testId":"t2"}"#)
        .await
        .unwrap();

    let stored = repo.get(TEST_SESSION_SLOT).await.unwrap();
    assert_eq!(stored.as_deref(), Some(r#"{"testId":"t2"}"#));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM local_slots")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn sqlite_delete_clears_slot() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot_delete?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.set("a", "1").await.unwrap();
    repo.set("b", "2").await.unwrap();
    repo.delete("a").await.unwrap();
    repo.delete("a").await.unwrap();

    assert!(repo.get("a").await.unwrap().is_none());
    assert_eq!(repo.get("b").await.unwrap().as_deref(), Some("2"));
}

#[tokio::test]
async fn sqlite_storage_survives_reconnect() {
    let url = "sqlite:file:memdb_slot_reload?mode=memory&cache=shared";
    let first = Storage::sqlite(url).await.expect("open");
    first.slots.set(TEST_SESSION_SLOT, "payload").await.unwrap();

    let second = Storage::sqlite(url).await.expect("reopen");
    assert_eq!(
        second.slots.get(TEST_SESSION_SLOT).await.unwrap().as_deref(),
        Some("payload")
    );
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_slot_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}
