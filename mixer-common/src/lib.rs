//! # Mixer Common Library
//!
//! Shared code for the mashup engine and its tools:
//! - Track profile and section data model
//! - Mono audio buffers and stem sets
//! - Configuration loading and root folder resolution
//! - Fade curve definitions for crossfades and tail fades
//! - SQLite profile database

pub mod audio;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod fade_curves;
pub mod profile;

pub use audio::{db_to_gain, secs_to_samples, AudioBuffer, StemName, StemSet};
pub use error::{Error, Result};
pub use fade_curves::{crossfade_append, fade_out_tail, FadeCurve};
pub use profile::{track_id, LyricalFunction, Section, SectionType, TrackProfile, VocalDensity};
