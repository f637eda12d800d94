//! Engine configuration
//!
//! Loaded once from TOML (every section and field optional) and passed around as
//! `Arc<MixerConfig>`. Root folder and config file discovery live in
//! `mixer_common::config`.

use crate::curator::MatchMode;
use mixer_common::config::{load_toml, resolve_config_file};
use mixer_common::{Error, FadeCurve, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Root folder override; the CLI flag and MIXER_ROOT take precedence
    pub root_folder: Option<PathBuf>,
    pub paths: PathsConfig,
    pub audio: AudioConfig,
    pub curator: CuratorConfig,
    pub stretch: StretchConfig,
    pub engineer: EngineerConfig,
    pub recommender: RecommenderConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Defaults to `<root>/mixer.db`
    pub database: Option<PathBuf>,
    /// Defaults to `<root>/mashups`
    pub mashup_output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Project sample rate; loaded audio is resampled to it
    pub sample_rate: u32,
    /// Export channel count
    pub channels: u16,
    /// Mastering peak ceiling below full scale
    pub headroom_db: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            headroom_db: 2.0,
        }
    }
}

/// Weighted compatibility score weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
    pub genre: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            tempo: 0.35,
            key: 0.30,
            energy: 0.20,
            genre: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.tempo + self.key + self.energy + self.genre
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    /// Maximum relative tempo difference for the hard filter
    pub bpm_tolerance: f64,
    /// Maximum wheel distance for the hard filter
    pub max_key_distance: u32,
    /// Reciprocal rank fusion smoothing constant
    pub rrf_k: f64,
    /// Genre sub-score when primary genres differ
    pub genre_partial_credit: f64,
    pub default_mode: MatchMode,
    pub max_candidates: usize,
    pub weights: ScoreWeights,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            bpm_tolerance: 0.05,
            max_key_distance: 1,
            rrf_k: 60.0,
            genre_partial_credit: 0.5,
            default_mode: MatchMode::Hybrid,
            max_candidates: 5,
            weights: ScoreWeights::default(),
        }
    }
}

/// Tempo stretch limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    pub min_ratio: f64,
    pub max_ratio: f64,
    /// Ratios below this (and at or above `min_ratio`) are flagged as quality risk
    pub risk_below: f64,
    /// Ratios above this (and at or below `max_ratio`) are flagged as quality risk
    pub risk_above: f64,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            min_ratio: 0.7,
            max_ratio: 1.3,
            risk_below: 0.8,
            risk_above: 1.2,
        }
    }
}

/// Vocal role thresholds for role-aware recomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleThresholds {
    /// Dense sections at or above this intensity sing lead
    pub lead_intensity: f64,
    /// Sparse sections at or above this intensity become harmony
    pub harmony_intensity: f64,
    /// Split between "high" and "low" when detecting call/response alternation
    pub call_response_intensity: f64,
}

impl Default for RoleThresholds {
    fn default() -> Self {
        Self {
            lead_intensity: 0.6,
            harmony_intensity: 0.6,
            call_response_intensity: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineerConfig {
    /// Vocal level relative to the instrumental bed
    pub vocal_attenuation_db: f32,
    /// Tail fade applied when aligned material overlaps poorly
    pub fade_duration_sec: f64,
    pub fade_curve: FadeCurve,
    /// Section boundary crossfade, clamped to 150-300 ms
    pub crossfade_sec: f64,
    pub max_transposition_semitones: i32,
    pub dialogue_gap_sec: f64,
    pub dialogue_bed_gain: f32,
    pub call_response_gap_sec: f64,
    pub harmony_semitones: i32,
    pub harmony_gain_db: f32,
    pub texture_gain: f32,
    pub roles: RoleThresholds,
}

impl Default for EngineerConfig {
    fn default() -> Self {
        Self {
            vocal_attenuation_db: -2.0,
            fade_duration_sec: 4.0,
            fade_curve: FadeCurve::EqualPower,
            crossfade_sec: 0.2,
            max_transposition_semitones: 6,
            dialogue_gap_sec: 0.4,
            dialogue_bed_gain: 0.4,
            call_response_gap_sec: 0.3,
            harmony_semitones: 3,
            harmony_gain_db: -6.0,
            texture_gain: 0.3,
            roles: RoleThresholds::default(),
        }
    }
}

impl EngineerConfig {
    pub fn effective_crossfade_sec(&self) -> f64 {
        self.crossfade_sec.clamp(0.15, 0.3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Jaccard overlap of theme sets that counts as "strong"
    pub theme_overlap_threshold: f64,
    /// Track energy difference below which energy matching is suggested
    pub energy_similarity: f64,
    /// Distinct tones across both tracks needed to suggest a semantic arc
    pub min_arc_tones: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            theme_overlap_threshold: 0.5,
            energy_similarity: 0.15,
            min_arc_tones: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub max_concurrent_jobs: usize,
    pub job_timeout_sec: u64,
    pub retry_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            job_timeout_sec: 600,
            retry_attempts: 3,
            retry_initial_backoff_ms: 200,
            retry_max_backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MixerConfig {
    /// Load from an explicit path, MIXER_CONFIG, or the user config dir; defaults otherwise
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = resolve_config_file(explicit)?;
        let config: MixerConfig = load_toml(path.as_deref())?;
        config.validate()?;
        if let Some(path) = path {
            info!(path = %path.display(), "Configuration loaded");
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.curator.weights;
        if [w.tempo, w.key, w.energy, w.genre].iter().any(|v| *v < 0.0) || w.total() <= 0.0 {
            return Err(Error::Config(
                "curator.weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if self.curator.bpm_tolerance.is_nan() || self.curator.bpm_tolerance <= 0.0 {
            return Err(Error::Config(
                "curator.bpm_tolerance must be positive".to_string(),
            ));
        }
        if self.curator.rrf_k < 0.0 {
            return Err(Error::Config("curator.rrf_k must be >= 0".to_string()));
        }
        let s = &self.stretch;
        if !(0.0 < s.min_ratio
            && s.min_ratio <= s.risk_below
            && s.risk_below <= s.risk_above
            && s.risk_above <= s.max_ratio)
        {
            return Err(Error::Config(
                "stretch bounds must satisfy 0 < min <= risk_below <= risk_above <= max".to_string(),
            ));
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            return Err(Error::Config(
                "audio.sample_rate and audio.channels must be positive".to_string(),
            ));
        }
        if self.engineer.max_transposition_semitones < 0 {
            return Err(Error::Config(
                "engineer.max_transposition_semitones must be >= 0".to_string(),
            ));
        }
        if self.jobs.max_concurrent_jobs == 0 || self.jobs.retry_attempts == 0 {
            return Err(Error::Config(
                "jobs.max_concurrent_jobs and jobs.retry_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        self.paths
            .database
            .clone()
            .unwrap_or_else(|| root.join("mixer.db"))
    }

    pub fn output_dir(&self, root: &Path) -> PathBuf {
        self.paths
            .mashup_output
            .clone()
            .unwrap_or_else(|| root.join("mashups"))
    }
}
