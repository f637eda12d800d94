//! Weighted compatibility score
//!
//! Independent of ranking: the score and its reasons justify a match to a human.

use crate::config::{CuratorConfig, ScoreWeights};
use crate::harmony::Key;
use mixer_common::TrackProfile;
use serde::Serialize;

/// Component scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
    pub genre: f64,
    /// Present when a semantic lookup ran for this candidate
    pub semantic: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compatibility {
    pub score: f64,
    pub sub_scores: SubScores,
    pub reasons: Vec<String>,
}

/// Decays linearly from 1 at equal tempo to 0 at the tolerance boundary
pub fn tempo_score(target_bpm: f64, candidate_bpm: f64, tolerance: f64) -> f64 {
    if target_bpm <= 0.0 || tolerance <= 0.0 {
        return 0.0;
    }
    let diff_pct = (candidate_bpm - target_bpm).abs() / target_bpm;
    (1.0 - diff_pct / tolerance).max(0.0)
}

pub fn key_score(distance: u32) -> f64 {
    match distance {
        0 => 1.0,
        1 => 0.7,
        _ => 0.4,
    }
}

pub fn energy_score(a: f64, b: f64) -> f64 {
    (1.0 - (a - b).abs()).clamp(0.0, 1.0)
}

pub fn genres_match(a: &TrackProfile, b: &TrackProfile) -> bool {
    match (a.main_genre(), b.main_genre()) {
        (Some(ga), Some(gb)) => ga.eq_ignore_ascii_case(gb),
        _ => false,
    }
}

/// Score `candidate` against `target`
pub fn compatibility(
    target: &TrackProfile,
    target_key: &Key,
    candidate: &TrackProfile,
    candidate_key: &Key,
    config: &CuratorConfig,
    weights: &ScoreWeights,
) -> Compatibility {
    let mut reasons = Vec::new();

    let tempo = tempo_score(target.bpm, candidate.bpm, config.bpm_tolerance);
    let diff_pct = (candidate.bpm - target.bpm).abs() / target.bpm * 100.0;
    if diff_pct < 2.0 {
        reasons.push(format!("BPM: {:.1} (perfect match, <2% diff)", candidate.bpm));
    } else {
        reasons.push(format!("BPM: {:.1} ({:.1}% diff)", candidate.bpm, diff_pct));
    }

    let distance = target_key.distance(candidate_key);
    let key = key_score(distance);
    reasons.push(match distance {
        0 => format!("Key: {} (perfect match)", candidate_key.camelot()),
        1 => format!("Key: {} (adjacent on the wheel)", candidate_key.camelot()),
        d => format!("Key: {} (distance: {})", candidate_key.camelot(), d),
    });

    let energy = energy_score(target.energy_level, candidate.energy_level);
    if (target.energy_level - candidate.energy_level).abs() < 0.15 {
        reasons.push(format!("Energy: {:.2} (similar vibe)", candidate.energy_level));
    } else {
        reasons.push(format!("Energy: {:.2} (contrast)", candidate.energy_level));
    }

    let same_genre = genres_match(target, candidate);
    let genre = if same_genre {
        1.0
    } else {
        config.genre_partial_credit
    };
    let genre_name = candidate.main_genre().unwrap_or("unknown");
    if same_genre {
        reasons.push(format!("Genre: {} (same genre)", genre_name));
    } else {
        reasons.push(format!("Genre: {} (cross-genre blend)", genre_name));
    }

    let score = (weights.tempo * tempo
        + weights.key * key
        + weights.energy * energy
        + weights.genre * genre)
        .clamp(0.0, 1.0);

    Compatibility {
        score,
        sub_scores: SubScores {
            tempo,
            key,
            energy,
            genre,
            semantic: None,
        },
        reasons,
    }
}
