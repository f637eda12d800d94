//! Test Helper Utilities
//!
//! Shared fixtures for mixer-engine integration tests

#![allow(dead_code)]

pub mod audio_fixtures;
pub mod profiles;

pub use audio_fixtures::{stem_set, tone, write_test_wav, TEST_SAMPLE_RATE};
pub use profiles::{profile, section, store_with, TrackFixture};

use mixer_engine::config::MixerConfig;
use mixer_engine::{Engineer, InMemoryProfileStore};
use std::path::Path;
use std::sync::Arc;

/// Defaults at the fixture sample rate, mono export, near-instant retries
pub fn test_config() -> MixerConfig {
    let mut config = MixerConfig::default();
    config.audio.sample_rate = TEST_SAMPLE_RATE;
    config.audio.channels = 1;
    config.jobs.max_concurrent_jobs = 2;
    config.jobs.retry_attempts = 2;
    config.jobs.retry_initial_backoff_ms = 1;
    config.jobs.retry_max_backoff_ms = 2;
    config
}

pub fn test_engineer(store: InMemoryProfileStore, output_dir: &Path) -> Engineer {
    Engineer::new(Arc::new(store), Arc::new(test_config()), output_dir.to_path_buf())
}
