//! Track profile and section data model
//!
//! Profiles are produced by the external analysis pipeline and are read-only to the
//! engine. The structures here are the contract boundary: they serialize to JSON for the
//! profile database and for fixture files.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length of a generated track identifier
pub const MAX_TRACK_ID_LEN: usize = 128;

/// Structural label of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Intro,
    Verse,
    #[serde(alias = "prechorus", alias = "pre-chorus")]
    PreChorus,
    Chorus,
    Bridge,
    Outro,
    Instrumental,
    #[serde(other)]
    Unknown,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Intro => "intro",
            SectionType::Verse => "verse",
            SectionType::PreChorus => "pre_chorus",
            SectionType::Chorus => "chorus",
            SectionType::Bridge => "bridge",
            SectionType::Outro => "outro",
            SectionType::Instrumental => "instrumental",
            SectionType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vocal density category (lyric words per second, bucketed by the analyzer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocalDensity {
    Sparse,
    #[default]
    Medium,
    Dense,
}

impl std::fmt::Display for VocalDensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VocalDensity::Sparse => write!(f, "sparse"),
            VocalDensity::Medium => write!(f, "medium"),
            VocalDensity::Dense => write!(f, "dense"),
        }
    }
}

/// Narrative role of a section's lyrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricalFunction {
    #[default]
    Narrative,
    Hook,
    Question,
    Answer,
    Reflection,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for LyricalFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LyricalFunction::Narrative => "narrative",
            LyricalFunction::Hook => "hook",
            LyricalFunction::Question => "question",
            LyricalFunction::Answer => "answer",
            LyricalFunction::Reflection => "reflection",
            LyricalFunction::Other => "other",
        };
        f.write_str(name)
    }
}

fn default_tone() -> String {
    "neutral".to_string()
}

/// A labeled time span within a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_type: SectionType,
    pub start_sec: f64,
    pub end_sec: f64,
    /// Normalized 0-1
    #[serde(default)]
    pub energy_level: f64,
    #[serde(default, alias = "spectral_centroid")]
    pub brightness: f64,
    #[serde(default)]
    pub tempo_stability: f64,
    #[serde(default)]
    pub vocal_density: VocalDensity,
    /// Normalized 0-1
    #[serde(default)]
    pub vocal_intensity: f64,
    #[serde(default = "default_tone")]
    pub emotional_tone: String,
    #[serde(default)]
    pub lyrical_function: LyricalFunction,
    #[serde(default)]
    pub themes: Vec<String>,
}

impl Section {
    pub fn duration_sec(&self) -> f64 {
        self.end_sec - self.start_sec
    }

    /// Case-insensitive theme membership
    pub fn has_theme(&self, theme: &str) -> bool {
        let wanted = theme.trim().to_lowercase();
        self.themes.iter().any(|t| t.trim().to_lowercase() == wanted)
    }

    pub fn is_theme_tagged(&self) -> bool {
        self.themes.iter().any(|t| !t.trim().is_empty())
    }

    pub fn tone(&self) -> String {
        self.emotional_tone.trim().to_lowercase()
    }
}

fn default_has_vocals() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    44100
}

/// Authoritative description of one analyzed track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProfile {
    pub id: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
    /// Beats per minute
    pub bpm: f64,
    /// Key as spelled by the analyzer ("C major", "Am", "8B", ...)
    pub key: String,
    #[serde(default)]
    pub duration_sec: f64,
    #[serde(default)]
    pub first_downbeat_sec: f64,
    /// Normalized 0-1
    #[serde(default)]
    pub energy_level: f64,
    #[serde(default)]
    pub valence: f64,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub primary_genre: String,
    #[serde(default)]
    pub mood_summary: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default = "default_has_vocals")]
    pub has_vocals: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl TrackProfile {
    pub fn has_sections(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Primary genre, falling back to the first listed genre
    pub fn main_genre(&self) -> Option<&str> {
        if !self.primary_genre.trim().is_empty() {
            return Some(self.primary_genre.trim());
        }
        self.genres.first().map(|g| g.trim()).filter(|g| !g.is_empty())
    }

    /// Lowercased union of all section themes
    pub fn theme_set(&self) -> BTreeSet<String> {
        self.sections
            .iter()
            .flat_map(|s| s.themes.iter())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Distinct section tones in first-seen order
    pub fn tones_in_order(&self) -> Vec<String> {
        let mut tones: Vec<String> = Vec::new();
        for section in &self.sections {
            let tone = section.tone();
            if !tone.is_empty() && !tones.contains(&tone) {
                tones.push(tone);
            }
        }
        tones
    }

    pub fn lyrical_functions(&self) -> BTreeSet<String> {
        self.sections
            .iter()
            .map(|s| s.lyrical_function.to_string())
            .collect()
    }

    /// Check the invariants the engine relies on
    ///
    /// Sections must have end > start and be ordered by start time without overlap.
    pub fn validate(&self) -> Result<()> {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(Error::InvalidInput(format!(
                "track {} has non-positive tempo {}",
                self.id, self.bpm
            )));
        }

        for (idx, section) in self.sections.iter().enumerate() {
            if section.end_sec <= section.start_sec {
                return Err(Error::InvalidInput(format!(
                    "track {} section {} ends at {:.3}s before it starts at {:.3}s",
                    self.id, idx, section.end_sec, section.start_sec
                )));
            }
            if idx > 0 {
                let previous = &self.sections[idx - 1];
                if section.start_sec < previous.end_sec {
                    return Err(Error::InvalidInput(format!(
                        "track {} section {} overlaps or precedes section {}",
                        self.id,
                        idx,
                        idx - 1
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Build the canonical track identifier from artist and title
///
/// Lowercases, turns spaces into underscores, keeps only `[a-z0-9_]` and caps the
/// length at [`MAX_TRACK_ID_LEN`].
pub fn track_id(artist: &str, title: &str) -> Result<String> {
    if artist.trim().is_empty() || title.trim().is_empty() {
        return Err(Error::InvalidInput(
            "artist and title cannot be empty".to_string(),
        ));
    }

    let raw = format!("{} {}", artist.trim(), title.trim()).to_lowercase();
    let mut id: String = raw
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    while id.contains("__") {
        id = id.replace("__", "_");
    }
    let id = id.trim_matches('_');
    let id: String = id.chars().take(MAX_TRACK_ID_LEN).collect();

    if id.is_empty() {
        return Err(Error::InvalidInput(format!(
            "artist/title '{} - {}' has no identifier characters",
            artist, title
        )));
    }
    Ok(id)
}
