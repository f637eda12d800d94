//! Mashup composition
//!
//! Every strategy runs through the same staged pipeline:
//!
//! ```text
//! Load -> Select -> Transform -> Mix -> Export
//! ```
//!
//! Loading talks to the profile store (async, retried). Selection, transformation and
//! mixing are CPU bound and run on the blocking pool. Cancellation is honoured between
//! stages only; a stage that has started runs to completion and its output is dropped.

pub mod decisions;
pub mod material;
pub mod mixdown;
pub mod strategies;

use crate::config::MixerConfig;
use crate::error::{MashupError, Result};
use crate::retry::{retry_transient, RetryPolicy};
use crate::store::ProfileStore;
use crate::wav::write_wav_16;
use chrono::{DateTime, Utc};
use mixer_common::{AudioBuffer, StemName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use decisions::{Decision, DecisionLog, MaterialLayer};
pub use material::{Material, SourceRequest, StemNeed, TrackAudio};
pub use mixdown::{Arrangement, Join, Layer, Segment};

use strategies::{
    dialogue::Dialogue, direct_swap::DirectSwap, energy_matched::EnergyMatched,
    key_corrected::KeyCorrected, role_aware::RoleAware, semantic_arc::SemanticArc,
    stem_assembly::StemAssembly, theme_filtered::ThemeFiltered,
};

/// The closed set of composition strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DirectSwap,
    StemAssembly,
    EnergyMatched,
    KeyCorrected,
    ThemeFiltered,
    SemanticArc,
    RoleAware,
    Dialogue,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 8] = [
        StrategyKind::DirectSwap,
        StrategyKind::StemAssembly,
        StrategyKind::EnergyMatched,
        StrategyKind::KeyCorrected,
        StrategyKind::ThemeFiltered,
        StrategyKind::SemanticArc,
        StrategyKind::RoleAware,
        StrategyKind::Dialogue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DirectSwap => "direct_swap",
            StrategyKind::StemAssembly => "stem_assembly",
            StrategyKind::EnergyMatched => "energy_matched",
            StrategyKind::KeyCorrected => "key_corrected",
            StrategyKind::ThemeFiltered => "theme_filtered",
            StrategyKind::SemanticArc => "semantic_arc",
            StrategyKind::RoleAware => "role_aware",
            StrategyKind::Dialogue => "dialogue",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = MashupError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| MashupError::UnknownStrategy(s.to_string()))
    }
}

/// A composition request: one strategy plus its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MashupJob {
    /// Vocals of one track over the instrumental of another
    DirectSwap {
        vocal_id: String,
        instrumental_id: String,
    },
    /// Each stem role taken from a chosen track; `drums` is the tempo reference
    StemAssembly { roles: BTreeMap<StemName, String> },
    EnergyMatched { track_a: String, track_b: String },
    /// Direct swap with the instrumental transposed onto the vocal's key
    KeyCorrected {
        vocal_id: String,
        instrumental_id: String,
    },
    ThemeFiltered {
        track_a: String,
        track_b: String,
        theme: String,
    },
    SemanticArc {
        track_a: String,
        track_b: String,
        #[serde(default)]
        arc: Option<Vec<String>>,
    },
    RoleAware { track_a: String, track_b: String },
    Dialogue { track_a: String, track_b: String },
}

impl MashupJob {
    pub fn kind(&self) -> StrategyKind {
        match self {
            MashupJob::DirectSwap { .. } => StrategyKind::DirectSwap,
            MashupJob::StemAssembly { .. } => StrategyKind::StemAssembly,
            MashupJob::EnergyMatched { .. } => StrategyKind::EnergyMatched,
            MashupJob::KeyCorrected { .. } => StrategyKind::KeyCorrected,
            MashupJob::ThemeFiltered { .. } => StrategyKind::ThemeFiltered,
            MashupJob::SemanticArc { .. } => StrategyKind::SemanticArc,
            MashupJob::RoleAware { .. } => StrategyKind::RoleAware,
            MashupJob::Dialogue { .. } => StrategyKind::Dialogue,
        }
    }

    /// Build a two-track job from a strategy kind
    ///
    /// Track A is the vocal source for swap-style strategies. Stem assembly takes
    /// vocals from A and every other role from B.
    pub fn for_pair(kind: StrategyKind, track_a: &str, track_b: &str, theme: Option<&str>) -> Result<Self> {
        let a = track_a.to_string();
        let b = track_b.to_string();
        Ok(match kind {
            StrategyKind::DirectSwap => MashupJob::DirectSwap {
                vocal_id: a,
                instrumental_id: b,
            },
            StrategyKind::StemAssembly => {
                let mut roles = BTreeMap::new();
                roles.insert(StemName::Vocals, a);
                roles.insert(StemName::Drums, b.clone());
                roles.insert(StemName::Bass, b.clone());
                roles.insert(StemName::Other, b);
                MashupJob::StemAssembly { roles }
            }
            StrategyKind::EnergyMatched => MashupJob::EnergyMatched { track_a: a, track_b: b },
            StrategyKind::KeyCorrected => MashupJob::KeyCorrected {
                vocal_id: a,
                instrumental_id: b,
            },
            StrategyKind::ThemeFiltered => MashupJob::ThemeFiltered {
                track_a: a,
                track_b: b,
                theme: theme
                    .map(str::to_string)
                    .ok_or_else(|| MashupError::InvalidJob("theme_filtered needs a theme".into()))?,
            },
            StrategyKind::SemanticArc => MashupJob::SemanticArc {
                track_a: a,
                track_b: b,
                arc: None,
            },
            StrategyKind::RoleAware => MashupJob::RoleAware { track_a: a, track_b: b },
            StrategyKind::Dialogue => MashupJob::Dialogue { track_a: a, track_b: b },
        })
    }
}

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Select,
    Transform,
    Mix,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Load => "load",
            Stage::Select => "select",
            Stage::Transform => "transform",
            Stage::Mix => "mix",
            Stage::Export => "export",
        };
        f.write_str(s)
    }
}

/// Shared interface of the composition strategies
///
/// `select_material` decides which sections or stems are used and logs each choice in
/// source order. `transform` stretches, aligns, transposes and sequences that material
/// into an [`Arrangement`]. `mix` renders the arrangement; most strategies keep the
/// default.
pub trait Strategy: Send + 'static {
    type Selection: Send;

    fn kind(&self) -> StrategyKind;

    /// Reject malformed jobs before anything is loaded
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Tracks to load, in role order
    fn sources(&self) -> Vec<SourceRequest>;

    fn select_material(
        &self,
        config: &MixerConfig,
        material: &Material,
        log: &mut DecisionLog,
    ) -> Result<Self::Selection>;

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        selection: Self::Selection,
        log: &mut DecisionLog,
    ) -> Result<Arrangement>;

    fn mix(&self, config: &MixerConfig, arrangement: Arrangement) -> Result<AudioBuffer> {
        mixdown::render(arrangement, config.engineer.fade_curve, config.audio.sample_rate)
    }

    /// Output file name, without directory
    fn output_name(&self) -> String;
}

/// Outcome of a successful composition
#[derive(Debug, Clone, Serialize)]
pub struct MashupResult {
    pub job_id: Uuid,
    pub strategy: StrategyKind,
    pub output_path: PathBuf,
    pub duration_sec: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub decisions: Vec<Decision>,
    pub created_at: DateTime<Utc>,
}

impl MashupResult {
    pub fn warnings(&self) -> impl Iterator<Item = &Decision> {
        self.decisions
            .iter()
            .filter(|d| matches!(d, Decision::Warning { .. } | Decision::Fallback { .. }))
    }
}

/// Runs mashup jobs against a profile store
pub struct Engineer {
    store: Arc<dyn ProfileStore>,
    config: Arc<MixerConfig>,
    output_dir: PathBuf,
    retry: RetryPolicy,
}

impl Engineer {
    pub fn new(store: Arc<dyn ProfileStore>, config: Arc<MixerConfig>, output_dir: PathBuf) -> Self {
        let retry = RetryPolicy::from(&config.jobs);
        Self {
            store,
            config,
            output_dir,
            retry,
        }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    /// Compose a mashup, running every stage to completion
    pub async fn compose(&self, job: &MashupJob) -> Result<MashupResult> {
        self.compose_with_cancel(job, Uuid::new_v4(), &CancellationToken::new())
            .await
    }

    /// Compose a mashup, checking `cancel` between stages
    pub async fn compose_with_cancel(
        &self,
        job: &MashupJob,
        job_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<MashupResult> {
        info!(job_id = %job_id, strategy = %job.kind(), "Composing mashup");

        match job.clone() {
            MashupJob::DirectSwap {
                vocal_id,
                instrumental_id,
            } => {
                self.run(DirectSwap::new(vocal_id, instrumental_id), job_id, cancel)
                    .await
            }
            MashupJob::StemAssembly { roles } => {
                self.run(StemAssembly::new(roles), job_id, cancel).await
            }
            MashupJob::EnergyMatched { track_a, track_b } => {
                self.run(EnergyMatched::new(track_a, track_b), job_id, cancel)
                    .await
            }
            MashupJob::KeyCorrected {
                vocal_id,
                instrumental_id,
            } => {
                self.run(KeyCorrected::new(vocal_id, instrumental_id), job_id, cancel)
                    .await
            }
            MashupJob::ThemeFiltered {
                track_a,
                track_b,
                theme,
            } => {
                self.run(ThemeFiltered::new(track_a, track_b, theme), job_id, cancel)
                    .await
            }
            MashupJob::SemanticArc {
                track_a,
                track_b,
                arc,
            } => {
                self.run(SemanticArc::new(track_a, track_b, arc), job_id, cancel)
                    .await
            }
            MashupJob::RoleAware { track_a, track_b } => {
                self.run(RoleAware::new(track_a, track_b), job_id, cancel)
                    .await
            }
            MashupJob::Dialogue { track_a, track_b } => {
                self.run(Dialogue::new(track_a, track_b), job_id, cancel)
                    .await
            }
        }
    }

    async fn run<S: Strategy>(
        &self,
        strategy: S,
        job_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<MashupResult> {
        strategy.validate()?;
        let kind = strategy.kind();

        check_cancelled(cancel, job_id, Stage::Load)?;
        let material = self
            .load_material(&strategy.sources())
            .await
            .map_err(|e| failed_in(job_id, kind, Stage::Load, e))?;

        check_cancelled(cancel, job_id, Stage::Select)?;
        let config = Arc::clone(&self.config);
        let token = cancel.clone();
        let (strategy, mixed, log) = tokio::task::spawn_blocking(move || {
            let mut log = DecisionLog::new(job_id);
            let material = material.conform(config.audio.sample_rate)?;

            let selection = strategy
                .select_material(&config, &material, &mut log)
                .map_err(|e| failed_in(job_id, kind, Stage::Select, e))?;
            check_cancelled(&token, job_id, Stage::Transform)?;

            let arrangement = strategy
                .transform(&config, &material, selection, &mut log)
                .map_err(|e| failed_in(job_id, kind, Stage::Transform, e))?;
            check_cancelled(&token, job_id, Stage::Mix)?;

            let mixed = strategy
                .mix(&config, arrangement)
                .map_err(|e| failed_in(job_id, kind, Stage::Mix, e))?;
            Ok::<_, MashupError>((strategy, mixed, log))
        })
        .await
        .map_err(|e| MashupError::audio("compose", e))??;

        check_cancelled(cancel, job_id, Stage::Export)?;
        if mixed.is_empty() {
            return Err(MashupError::audio("mix", "strategy produced no audio"));
        }

        let output_path = self.output_dir.join(strategy.output_name());
        let channels = self.config.audio.channels;
        let headroom_db = self.config.audio.headroom_db;
        let export_path = output_path.clone();
        let mastered = tokio::task::spawn_blocking(move || {
            let mastered = mixdown::master(mixed, headroom_db);
            write_wav_16(&export_path, &mastered, channels)?;
            Ok::<_, MashupError>(mastered)
        })
        .await
        .map_err(|e| MashupError::audio("export", e))??;

        let result = MashupResult {
            job_id,
            strategy: kind,
            output_path,
            duration_sec: mastered.duration_sec(),
            sample_rate: mastered.sample_rate,
            channels,
            decisions: log.into_entries(),
            created_at: Utc::now(),
        };

        info!(
            job_id = %job_id,
            strategy = %kind,
            path = %result.output_path.display(),
            duration_sec = result.duration_sec,
            decisions = result.decisions.len(),
            "Mashup created"
        );
        Ok(result)
    }

    async fn load_material(&self, sources: &[SourceRequest]) -> Result<Material> {
        let mut material = Material::new(self.config.audio.sample_rate);

        for request in sources {
            if material.contains(&request.track_id) {
                continue;
            }
            let id = request.track_id.as_str();
            let profile = retry_transient("get_profile", &self.retry, || self.store.get_profile(id)).await?;
            if !(profile.bpm.is_finite() && profile.bpm > 0.0) {
                return Err(MashupError::InvalidProfile {
                    id: profile.id.clone(),
                    reason: format!("tempo {} is not positive", profile.bpm),
                });
            }

            let (mix, stems) = match request.stems {
                StemNeed::None => {
                    let mix = retry_transient("get_mix", &self.retry, || self.store.get_mix(id)).await?;
                    (mix, None)
                }
                StemNeed::Required => {
                    let stems =
                        retry_transient("get_stems", &self.retry, || self.store.get_stems(id)).await?;
                    (stems.full_mix(), Some(stems))
                }
                StemNeed::Optional => {
                    let mix = retry_transient("get_mix", &self.retry, || self.store.get_mix(id)).await?;
                    let stems = match retry_transient("get_stems", &self.retry, || self.store.get_stems(id)).await {
                        Ok(stems) => Some(stems),
                        Err(MashupError::StemsUnavailable { .. }) => {
                            debug!(track_id = %id, "Stems unavailable, continuing with full mix only");
                            None
                        }
                        Err(e) => return Err(e),
                    };
                    (mix, stems)
                }
            };

            debug!(
                track_id = %id,
                bpm = profile.bpm,
                sections = profile.sections.len(),
                has_stems = stems.is_some(),
                "Loaded track material"
            );
            material.insert(TrackAudio::new(profile, mix, stems));
        }

        Ok(material)
    }
}

/// Record which stage a job failed in; the error itself is passed through
fn failed_in(job_id: Uuid, kind: StrategyKind, stage: Stage, err: MashupError) -> MashupError {
    warn!(job_id = %job_id, strategy = %kind, stage = %stage, error = %err, "Stage failed");
    err
}

fn check_cancelled(token: &CancellationToken, job_id: Uuid, stage: Stage) -> Result<()> {
    if token.is_cancelled() {
        return Err(MashupError::Cancelled {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
        });
    }
    Ok(())
}

/// Reduce an id or theme to characters safe in a file name
pub(crate) fn file_part(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
