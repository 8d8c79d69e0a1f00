//! Unit tests for database initialization
//!
//! Covers:
//! - Automatic database creation (including missing parent folders)
//! - The tables and columns the runner reads and writes
//! - Reopening an existing database keeps its rows

use songgen_common::db::{init_database, SCHEMA_VERSION};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
    sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{}')", table))
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("songgen.db");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("songgen.db")).await.unwrap();

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_runner_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("songgen.db")).await.unwrap();

    let generations = column_names(&pool, "song_generations").await;
    for column in [
        "generation_id",
        "song_prompt",
        "use_custom_mode",
        "use_instrumental_only",
        "song_input_custom_lyrics",
        "error_message",
        "output_reply_id",
        "output_song",
        "song_output_title",
    ] {
        assert!(generations.iter().any(|c| c == column), "song_generations lacks {}", column);
    }

    assert_eq!(
        column_names(&pool, "runner_status").await,
        vec!["identity", "remaining_credits", "latest_error", "updated_at"]
    );
    assert_eq!(column_names(&pool, "users").await, vec!["user_id", "platform_user_id"]);
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("songgen.db")).await.unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_busy_timeout_on_every_connection() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("songgen.db")).await.unwrap();

    // Hold several connections at once so each one is a distinct handle
    let mut held = Vec::new();
    for _ in 0..3 {
        held.push(pool.acquire().await.unwrap());
    }
    for conn in held.iter_mut() {
        let timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        assert_eq!(timeout, 5000);
    }
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("songgen.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO runner_status (identity, remaining_credits) VALUES (?, ?)")
        .bind("5550001111")
        .bind(900_i64)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let credits: Option<i64> =
        sqlx::query_scalar("SELECT remaining_credits FROM runner_status WHERE identity = ?")
            .bind("5550001111")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(credits, Some(900));
}
