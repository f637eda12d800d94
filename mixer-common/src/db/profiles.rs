//! Track profile persistence

use crate::audio::StemName;
use crate::profile::TrackProfile;
use crate::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What an audio path row points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AudioRole {
    /// Full mix before separation
    Mix,
    Stem(StemName),
}

impl AudioRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioRole::Mix => "mix",
            AudioRole::Stem(stem) => stem.as_str(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s == "mix" {
            return Some(AudioRole::Mix);
        }
        s.parse::<StemName>().ok().map(AudioRole::Stem)
    }
}

/// Insert or overwrite a profile (re-analysis replaces the previous row)
pub async fn save_profile(pool: &SqlitePool, profile: &TrackProfile) -> Result<()> {
    profile.validate()?;
    let profile_json = serde_json::to_string(profile)?;

    sqlx::query(
        r#"
        INSERT INTO track_profiles (id, artist, title, bpm, musical_key, profile_json, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            artist = excluded.artist,
            title = excluded.title,
            bpm = excluded.bpm,
            musical_key = excluded.musical_key,
            profile_json = excluded.profile_json,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&profile.id)
    .bind(&profile.artist)
    .bind(&profile.title)
    .bind(profile.bpm)
    .bind(&profile.key)
    .bind(&profile_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one profile; `None` when the id is unknown
pub async fn load_profile(pool: &SqlitePool, id: &str) -> Result<Option<TrackProfile>> {
    let row = sqlx::query("SELECT profile_json FROM track_profiles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let json: String = row.get("profile_json");
            Ok(Some(serde_json::from_str(&json)?))
        }
        None => Ok(None),
    }
}

/// All profiles ordered by id
pub async fn list_profiles(pool: &SqlitePool) -> Result<Vec<TrackProfile>> {
    let rows = sqlx::query("SELECT profile_json FROM track_profiles ORDER BY id")
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let json: String = row.get("profile_json");
            serde_json::from_str(&json).map_err(Error::from)
        })
        .collect()
}

/// Record where a track's mix or stem lives on disk
pub async fn save_audio_path(
    pool: &SqlitePool,
    track_id: &str,
    role: AudioRole,
    path: &std::path::Path,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO track_audio (track_id, role, path) VALUES (?, ?, ?)
        ON CONFLICT(track_id, role) DO UPDATE SET path = excluded.path
        "#,
    )
    .bind(track_id)
    .bind(role.as_str())
    .bind(path.to_string_lossy().to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// All audio paths recorded for a track; unknown role strings are skipped
pub async fn load_audio_paths(
    pool: &SqlitePool,
    track_id: &str,
) -> Result<BTreeMap<AudioRole, PathBuf>> {
    let rows = sqlx::query("SELECT role, path FROM track_audio WHERE track_id = ?")
        .bind(track_id)
        .fetch_all(pool)
        .await?;

    let mut paths = BTreeMap::new();
    for row in rows {
        let role: String = row.get("role");
        let path: String = row.get("path");
        match AudioRole::parse(&role) {
            Some(role) => {
                paths.insert(role, PathBuf::from(path));
            }
            None => tracing::warn!(track_id, role = %role, "Skipping unknown audio role"),
        }
    }
    Ok(paths)
}
