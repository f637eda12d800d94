//! Profile store seam
//!
//! The curator and engineer take a store handle explicitly. Profiles and audio are
//! produced by external analysis and separation; this crate only reads them.

pub mod sqlite;

use crate::error::{MashupError, Result};
use mixer_common::{AudioBuffer, StemSet, TrackProfile};
use std::collections::BTreeMap;

pub use sqlite::SqliteProfileStore;

/// Read-only access to analyzed tracks
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fails with `ProfileNotFound` for unknown ids
    async fn get_profile(&self, id: &str) -> Result<TrackProfile>;

    /// Every profile, ordered by id
    async fn list_profiles(&self) -> Result<Vec<TrackProfile>>;

    /// Full mix; fails with `AudioUnavailable` when none is recorded
    async fn get_mix(&self, id: &str) -> Result<AudioBuffer>;

    /// Separated stems; fails with `StemsUnavailable` when separation has not run
    async fn get_stems(&self, id: &str) -> Result<StemSet>;
}

/// Fixture store held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryProfileStore {
    profiles: BTreeMap<String, TrackProfile>,
    mixes: BTreeMap<String, AudioBuffer>,
    stems: BTreeMap<String, StemSet>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile; malformed tempo or sections are rejected
    pub fn insert_profile(&mut self, profile: TrackProfile) -> Result<()> {
        check_profile(&profile)?;
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn insert_mix(&mut self, id: &str, mix: AudioBuffer) {
        self.mixes.insert(id.to_string(), mix);
    }

    pub fn insert_stems(&mut self, id: &str, stems: StemSet) {
        self.stems.insert(id.to_string(), stems);
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = TrackProfile>) -> Result<Self> {
        let mut store = Self::new();
        for profile in profiles {
            store.insert_profile(profile)?;
        }
        Ok(store)
    }
}

/// [`TrackProfile::validate`] reported as `InvalidProfile` for the offending id
pub(crate) fn check_profile(profile: &TrackProfile) -> Result<()> {
    profile.validate().map_err(|e| MashupError::InvalidProfile {
        id: profile.id.clone(),
        reason: e.to_string(),
    })
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: &str) -> Result<TrackProfile> {
        self.profiles
            .get(id)
            .cloned()
            .ok_or_else(|| MashupError::ProfileNotFound { id: id.to_string() })
    }

    async fn list_profiles(&self) -> Result<Vec<TrackProfile>> {
        Ok(self.profiles.values().cloned().collect())
    }

    async fn get_mix(&self, id: &str) -> Result<AudioBuffer> {
        self.mixes
            .get(id)
            .cloned()
            .ok_or_else(|| MashupError::AudioUnavailable {
                id: id.to_string(),
                reason: "no full mix recorded".to_string(),
            })
    }

    async fn get_stems(&self, id: &str) -> Result<StemSet> {
        self.stems
            .get(id)
            .cloned()
            .ok_or_else(|| MashupError::StemsUnavailable { id: id.to_string() })
    }
}
