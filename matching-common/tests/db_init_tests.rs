//! Database initialization against real files
//!
//! Covers first-run creation, reopening an existing database, default
//! settings seeding and migration bookkeeping.

use matching_common::db::init::{init_database, load_setting};
use matching_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("matching.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("matching.db");

    let pool1 = init_database(&db_path).await.expect("first open");
    sqlx::query(
        "INSERT INTO tags (guid, name, category, created_at) VALUES ('t1', 'hiking', 'sports', 0)",
    )
    .execute(&pool1)
    .await
    .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.expect("Failed to open existing database");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1, "existing rows must survive reopening");
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("matching.db")).await.unwrap();

    let count: usize = load_setting(&pool, "recommendation_default_count", 0).await.unwrap();
    assert_eq!(count, 20);

    let km: f64 = load_setting(&pool, "location_default_max_distance_km", 0.0).await.unwrap();
    assert_eq!(km, 50.0);
}

#[tokio::test]
async fn test_user_setting_survives_reinit() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("matching.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '35' WHERE key = 'recommendation_default_count'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: usize = load_setting(&pool, "recommendation_default_count", 0).await.unwrap();
    assert_eq!(count, 35);
}

#[tokio::test]
async fn test_fresh_database_is_at_current_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("matching.db")).await.unwrap();

    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}
