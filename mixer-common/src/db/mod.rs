//! SQLite profile database
//!
//! Holds analyzed track profiles (as JSON rows) and the locations of each track's full
//! mix and separated stems. The engine only reads; the `import` command and tests write.

pub mod profiles;

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

pub use profiles::{
    load_audio_paths, load_profile, list_profiles, save_audio_path, save_profile, AudioRole,
};

/// Open (creating if needed) the profile database and ensure its tables exist
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_profiles (
            id TEXT PRIMARY KEY,
            artist TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            bpm REAL NOT NULL,
            musical_key TEXT NOT NULL,
            profile_json TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_audio (
            track_id TEXT NOT NULL REFERENCES track_profiles(id) ON DELETE CASCADE,
            role TEXT NOT NULL,
            path TEXT NOT NULL,
            PRIMARY KEY (track_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (track_profiles, track_audio)");

    Ok(())
}
