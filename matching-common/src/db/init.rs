//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas,
//! creates every table idempotently, runs versioned migrations and seeds
//! default runtime settings.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'database_busy_timeout_ms'",
    )
    .fetch_optional(&pool)
    .await?
    .unwrap_or(5000);

    sqlx::query(&format!("PRAGMA busy_timeout = {}", timeout_ms))
        .execute(&pool)
        .await?;
    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Uses a single connection: every SQLite `:memory:` connection is its own
/// database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables, run migrations and seed settings (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_tags_table(pool).await?;
    create_user_tags_table(pool).await?;
    create_user_interactions_table(pool).await?;
    create_user_matches_table(pool).await?;
    create_cache_entries_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 0 CHECK (usage_count >= 0),
            created_at INTEGER NOT NULL,
            last_used_at INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tags_category ON tags(category)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_user_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_tags (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            tag_id TEXT NOT NULL REFERENCES tags(guid),
            weight REAL NOT NULL CHECK (weight >= 0.0 AND weight <= 1.0),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            UNIQUE (user_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_tags_tag ON user_tags(tag_id, is_active)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_user_interactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_interactions (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            target_user_id TEXT NOT NULL,
            interaction_type TEXT NOT NULL,
            rating REAL NOT NULL DEFAULT 0 CHECK (rating >= 0.0 AND rating <= 5.0),
            created_at INTEGER NOT NULL,
            context TEXT,
            metadata TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interactions_user_time ON user_interactions(user_id, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interactions_pair ON user_interactions(user_id, target_user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_matches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_matches (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            matched_user_id TEXT NOT NULL,
            score REAL NOT NULL CHECK (score >= 0.0 AND score <= 1.0),
            match_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at INTEGER NOT NULL,
            last_interaction_at INTEGER,
            notes TEXT,
            UNIQUE (user_id, matched_user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_user_status ON user_matches(user_id, status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the shared cache table used by [`crate::cache::SqliteCache`]
pub async fn create_cache_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or repair default runtime settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "database_busy_timeout_ms", "5000").await?;
    ensure_setting(pool, "recommendation_default_count", "20").await?;
    ensure_setting(pool, "location_default_max_distance_km", "50").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// Missing settings are created; NULL values are reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match value {
        None => {
            // INSERT OR IGNORE tolerates concurrent initialization
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
        Some(None) => {
            sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        Some(Some(_)) => {}
    }

    Ok(())
}

/// Read a runtime setting, falling back to `default` when missing or unparsable
pub async fn load_setting<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match value.flatten() {
        Some(raw) => match raw.parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => {
                warn!("Setting '{}' has unparsable value '{}', using default", key, raw);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_init_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        init_schema(&pool).await.expect("second init should succeed");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in ["cache_entries", "settings", "tags", "user_interactions", "user_matches", "user_tags"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_null_setting_reset_to_default() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("UPDATE settings SET value = NULL WHERE key = 'recommendation_default_count'")
            .execute(&pool)
            .await
            .unwrap();

        ensure_setting(&pool, "recommendation_default_count", "20").await.unwrap();

        let count: usize = load_setting(&pool, "recommendation_default_count", 0).await.unwrap();
        assert_eq!(count, 20);
    }

    #[tokio::test]
    async fn test_load_setting_falls_back_on_garbage() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("UPDATE settings SET value = 'lots' WHERE key = 'location_default_max_distance_km'")
            .execute(&pool)
            .await
            .unwrap();

        let km: f64 = load_setting(&pool, "location_default_max_distance_km", 50.0).await.unwrap();
        assert_eq!(km, 50.0);

        let missing: i64 = load_setting(&pool, "no_such_key", 7).await.unwrap();
        assert_eq!(missing, 7);
    }

    #[tokio::test]
    async fn test_weight_check_constraint_enforced() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query(
            "INSERT INTO tags (guid, name, category, created_at) VALUES ('t1', 'chess', 'gaming', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO user_tags (guid, user_id, tag_id, weight, created_at, updated_at)
             VALUES ('ut1', 'u1', 't1', 1.5, 0, 0)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "weight outside [0,1] must be rejected by storage");
    }
}
