//! Error types for the mashup engine
//!
//! Errors fall into four categories that decide how a caller reacts:
//! input errors are surfaced immediately, bounds violations reject the pairing,
//! external failures are retried with backoff before failing the job, and internal
//! errors indicate a bug or an unusable environment. Degradable conditions (short
//! overlap, missing dialogue structure, failed harmony transposition) are never errors;
//! strategies record them in the decision log instead.

use serde::Serialize;
use thiserror::Error;

/// Engine result type
pub type Result<T> = std::result::Result<T, MashupError>;

/// How the caller should treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad ids, keys or job definitions; never retried
    Input,
    /// Tempo or transposition limits exceeded; offer another pairing
    Bounds,
    /// Similarity index, stem or audio source failure; retried then surfaced
    External,
    Internal,
}

/// Engine error type
#[derive(Debug, Error)]
pub enum MashupError {
    #[error("Profile not found: {id}")]
    ProfileNotFound { id: String },

    #[error("Unrecognized key spelling: '{key}'{}", track_label(.track_id))]
    KeyFormat { key: String, track_id: Option<String> },

    #[error("Unknown strategy: '{0}'")]
    UnknownStrategy(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid profile {id}: {reason}")]
    InvalidProfile { id: String, reason: String },

    #[error("Strategy {strategy} requires section metadata, track {id} has none")]
    MissingSections { id: String, strategy: String },

    #[error("Semantic matching for {target_id} needs a query and the target has no mood summary")]
    SemanticQueryRequired { target_id: String },

    #[error(
        "Stretch ratio {ratio:.3}{} ({source_bpm:.1} -> {target_bpm:.1} BPM) outside [{min}, {max}]",
        pair_label(.source_id, .target_id)
    )]
    StretchRatioOutOfBounds {
        source_id: Option<String>,
        target_id: Option<String>,
        ratio: f64,
        source_bpm: f64,
        target_bpm: f64,
        min: f64,
        max: f64,
    },

    #[error(
        "Transposition of {semitones} semitones{} exceeds limit of {max}",
        pair_label(.source_id, .target_id)
    )]
    TranspositionTooLarge {
        source_id: Option<String>,
        target_id: Option<String>,
        semitones: i32,
        max: i32,
    },

    #[error("Stems unavailable for track {id}")]
    StemsUnavailable { id: String },

    #[error("Audio unavailable for track {id}: {reason}")]
    AudioUnavailable { id: String, reason: String },

    #[error("Similarity lookup failed: {0}")]
    SimilarityLookup(String),

    #[error("Audio processing failed during {stage}: {reason}")]
    Audio { stage: String, reason: String },

    #[error("Job {job_id} cancelled before {stage}")]
    Cancelled { job_id: String, stage: String },

    #[error("Job {job_id} exceeded its {budget_sec}s budget")]
    TimedOut { job_id: String, budget_sec: u64 },

    #[error("Store error: {0}")]
    Store(#[from] mixer_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn track_label(id: &Option<String>) -> String {
    id.as_ref().map(|id| format!(" on track {}", id)).unwrap_or_default()
}

fn pair_label(source: &Option<String>, target: &Option<String>) -> String {
    match (source, target) {
        (Some(s), Some(t)) => format!(" for {} -> {}", s, t),
        _ => String::new(),
    }
}

impl MashupError {
    /// Attach the pairing to a bounds error raised from bare tempos or keys
    ///
    /// `source_id` is the track being stretched or transposed. Other errors pass through.
    pub fn with_pair(self, source_id: &str, target_id: &str) -> Self {
        match self {
            MashupError::StretchRatioOutOfBounds {
                ratio,
                source_bpm,
                target_bpm,
                min,
                max,
                ..
            } => MashupError::StretchRatioOutOfBounds {
                source_id: Some(source_id.to_string()),
                target_id: Some(target_id.to_string()),
                ratio,
                source_bpm,
                target_bpm,
                min,
                max,
            },
            MashupError::TranspositionTooLarge { semitones, max, .. } => MashupError::TranspositionTooLarge {
                source_id: Some(source_id.to_string()),
                target_id: Some(target_id.to_string()),
                semitones,
                max,
            },
            other => other,
        }
    }

    /// Attach the owning track to a key spelling error
    pub fn with_track(self, id: &str) -> Self {
        match self {
            MashupError::KeyFormat { key, .. } => MashupError::KeyFormat {
                key,
                track_id: Some(id.to_string()),
            },
            other => other,
        }
    }

    pub fn audio(stage: &str, reason: impl std::fmt::Display) -> Self {
        MashupError::Audio {
            stage: stage.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MashupError::ProfileNotFound { .. }
            | MashupError::KeyFormat { .. }
            | MashupError::UnknownStrategy(_)
            | MashupError::InvalidJob(_)
            | MashupError::InvalidProfile { .. }
            | MashupError::MissingSections { .. }
            | MashupError::SemanticQueryRequired { .. } => ErrorCategory::Input,
            MashupError::StretchRatioOutOfBounds { .. }
            | MashupError::TranspositionTooLarge { .. } => ErrorCategory::Bounds,
            MashupError::StemsUnavailable { .. }
            | MashupError::AudioUnavailable { .. }
            | MashupError::SimilarityLookup(_)
            | MashupError::TimedOut { .. } => ErrorCategory::External,
            MashupError::Store(err) => match err {
                mixer_common::Error::InvalidInput(_) => ErrorCategory::Input,
                _ => ErrorCategory::External,
            },
            MashupError::Audio { .. } | MashupError::Cancelled { .. } | MashupError::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Worth retrying: external collaborator failures and database lock contention
    pub fn is_transient(&self) -> bool {
        match self {
            MashupError::SimilarityLookup(_) | MashupError::StemsUnavailable { .. } => true,
            MashupError::Store(err) => err.is_lock_contention(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            MashupError::ProfileNotFound { id: "x".into() }.category(),
            ErrorCategory::Input
        );
        assert_eq!(
            MashupError::TranspositionTooLarge {
                source_id: None,
                target_id: None,
                semitones: 7,
                max: 6
            }
            .category(),
            ErrorCategory::Bounds
        );
        assert_eq!(
            MashupError::SimilarityLookup("timeout".into()).category(),
            ErrorCategory::External
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(MashupError::SimilarityLookup("timeout".into()).is_transient());
        assert!(MashupError::StemsUnavailable { id: "t".into() }.is_transient());
        assert!(!MashupError::KeyFormat {
            key: "H".into(),
            track_id: None
        }.is_transient());
        assert!(!MashupError::Store(mixer_common::Error::InvalidInput("t".into())).is_transient());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = MashupError::StretchRatioOutOfBounds {
            source_id: None,
            target_id: None,
            ratio: 1.35,
            source_bpm: 100.0,
            target_bpm: 135.0,
            min: 0.7,
            max: 1.3,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.350"));
        assert!(msg.contains("100.0"));

        let err = err.with_pair("slow", "fast");
        assert!(matches!(
            &err,
            MashupError::StretchRatioOutOfBounds { source_id: Some(s), target_id: Some(t), .. }
                if s == "slow" && t == "fast"
        ));
        assert!(err.to_string().contains("for slow -> fast"));
    }

    #[test]
    fn test_track_context_only_fills_matching_variants() {
        let err = MashupError::KeyFormat {
            key: "H#".into(),
            track_id: None,
        }
        .with_track("t1");
        assert!(matches!(&err, MashupError::KeyFormat { track_id: Some(id), .. } if id == "t1"));
        assert!(err.to_string().ends_with("on track t1"));

        let untouched = MashupError::InvalidJob("x".into()).with_pair("a", "b").with_track("c");
        assert!(matches!(untouched, MashupError::InvalidJob(ref m) if m == "x"));
    }
}
