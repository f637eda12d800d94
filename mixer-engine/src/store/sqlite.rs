//! SQLite-backed profile store
//!
//! Profiles come from the `track_profiles` table; audio is read from the WAV paths in
//! `track_audio` and resampled to the project rate on load.

use super::{check_profile, ProfileStore};
use crate::dsp::resample_buffer;
use crate::error::{MashupError, Result};
use crate::wav::read_wav_mono;
use mixer_common::db::{self, AudioRole};
use mixer_common::{AudioBuffer, StemName, StemSet, TrackProfile};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct SqliteProfileStore {
    pool: SqlitePool,
    sample_rate: u32,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool, sample_rate: u32) -> Self {
        Self { pool, sample_rate }
    }

    /// Open (creating if needed) the database at `db_path`
    pub async fn open(db_path: &Path, sample_rate: u32) -> Result<Self> {
        let pool = db::init_database_pool(db_path).await?;
        Ok(Self::new(pool, sample_rate))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_wav(&self, id: &str, path: PathBuf) -> Result<AudioBuffer> {
        let target_rate = self.sample_rate;
        let track_id = id.to_string();
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Err(MashupError::AudioUnavailable {
                    id: track_id,
                    reason: format!("{} does not exist", path.display()),
                });
            }
            let buffer = read_wav_mono(&path)?;
            debug!(
                track_id = %track_id,
                path = %path.display(),
                sample_rate = buffer.sample_rate,
                "Loaded audio"
            );
            resample_buffer(buffer, target_rate)
        })
        .await
        .map_err(|e| MashupError::audio("load", e))?
    }
}

#[async_trait::async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get_profile(&self, id: &str) -> Result<TrackProfile> {
        let profile = db::load_profile(&self.pool, id)
            .await?
            .ok_or_else(|| MashupError::ProfileNotFound { id: id.to_string() })?;
        check_profile(&profile)?;
        Ok(profile)
    }

    async fn list_profiles(&self) -> Result<Vec<TrackProfile>> {
        let profiles = db::list_profiles(&self.pool).await?;
        for profile in &profiles {
            check_profile(profile)?;
        }
        Ok(profiles)
    }

    async fn get_mix(&self, id: &str) -> Result<AudioBuffer> {
        let mut paths = db::load_audio_paths(&self.pool, id).await?;
        let path = paths
            .remove(&AudioRole::Mix)
            .ok_or_else(|| MashupError::AudioUnavailable {
                id: id.to_string(),
                reason: "no full mix recorded".to_string(),
            })?;
        self.load_wav(id, path).await
    }

    async fn get_stems(&self, id: &str) -> Result<StemSet> {
        let paths = db::load_audio_paths(&self.pool, id).await?;
        let mut stems = BTreeMap::new();
        for (role, path) in paths {
            if let AudioRole::Stem(name) = role {
                let buffer = self.load_wav(id, path).await.map_err(|e| match e {
                    MashupError::AudioUnavailable { .. } => {
                        MashupError::StemsUnavailable { id: id.to_string() }
                    }
                    other => other,
                })?;
                stems.insert(name, buffer);
            }
        }

        if !stems.contains_key(&StemName::Vocals) || stems.len() < 2 {
            return Err(MashupError::StemsUnavailable { id: id.to_string() });
        }
        Ok(StemSet::new(stems))
    }
}
