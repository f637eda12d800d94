//! Direct swap with the instrumental transposed onto the vocal's key
//!
//! The vocal is never pitch-shifted. A shift beyond the configured limit rejects the
//! job rather than degrading quality.

use super::{plan_tempo, validate_two_tracks, vocal_over_bed};
use crate::config::MixerConfig;
use crate::dsp::pitch_shift;
use crate::engineer::{
    file_part, Arrangement, DecisionLog, Material, SourceRequest, Strategy, StrategyKind, TrackAudio,
};
use crate::error::{MashupError, Result};
use crate::harmony::{parse_key, TempoMatch};
use mixer_common::StemName;

pub struct KeyCorrected {
    vocal_id: String,
    instrumental_id: String,
}

/// Roles after the has-vocals check, and the planned transposition
#[derive(Debug)]
pub struct KeyPlan {
    vocal_id: String,
    instrumental_id: String,
    semitones: i32,
    tempo: TempoMatch,
}

impl KeyCorrected {
    pub fn new(vocal_id: String, instrumental_id: String) -> Self {
        Self {
            vocal_id,
            instrumental_id,
        }
    }
}

/// Semitones that move `bed_key` onto `vocal_key`, or 0 when already compatible
pub fn shift_between(vocal_key: &str, bed_key: &str, max_semitones: i32) -> Result<i32> {
    let vocal = parse_key(vocal_key)?;
    let bed = parse_key(bed_key)?;
    if bed.distance(&vocal) <= 1 {
        return Ok(0);
    }
    let semitones = bed.shift_to(&vocal);
    if semitones.abs() > max_semitones {
        return Err(MashupError::TranspositionTooLarge {
            source_id: None,
            target_id: None,
            semitones,
            max: max_semitones,
        });
    }
    Ok(semitones)
}

/// [`shift_between`] for two loaded tracks, with their ids on any error
fn plan_shift(vocal: &TrackAudio, bed: &TrackAudio, max_semitones: i32) -> Result<i32> {
    parse_key(&vocal.profile.key).map_err(|e| e.with_track(vocal.id()))?;
    parse_key(&bed.profile.key).map_err(|e| e.with_track(bed.id()))?;
    shift_between(&vocal.profile.key, &bed.profile.key, max_semitones)
        .map_err(|e| e.with_pair(bed.id(), vocal.id()))
}

impl Strategy for KeyCorrected {
    type Selection = KeyPlan;

    fn kind(&self) -> StrategyKind {
        StrategyKind::KeyCorrected
    }

    fn validate(&self) -> Result<()> {
        validate_two_tracks(&self.vocal_id, &self.instrumental_id)
    }

    fn sources(&self) -> Vec<SourceRequest> {
        vec![
            SourceRequest::stems(&self.vocal_id),
            SourceRequest::stems(&self.instrumental_id),
        ]
    }

    fn select_material(
        &self,
        config: &MixerConfig,
        material: &Material,
        log: &mut DecisionLog,
    ) -> Result<KeyPlan> {
        let mut vocal = material.track(&self.vocal_id)?;
        let mut bed = material.track(&self.instrumental_id)?;

        if !vocal.profile.has_vocals && bed.profile.has_vocals {
            log.fallback(
                "select",
                format!(
                    "{} has no vocals; using {} as the vocal source and transposing {} instead",
                    vocal.id(),
                    bed.id(),
                    vocal.id()
                ),
            );
            std::mem::swap(&mut vocal, &mut bed);
        }

        vocal.vocals()?;
        let semitones = plan_shift(vocal, bed, config.engineer.max_transposition_semitones)?;

        log.stem(vocal.id(), StemName::Vocals, "lead vocal (untransposed)");
        if let Some(stems) = &bed.stems {
            for name in stems.names().into_iter().filter(|n| *n != StemName::Vocals) {
                log.stem(bed.id(), name, "instrumental bed");
            }
        }

        if semitones == 0 {
            log.transposition(
                bed.id(),
                0,
                format!(
                    "{} and {} are already compatible, no shift",
                    bed.profile.key, vocal.profile.key
                ),
            );
        } else {
            log.transposition(
                bed.id(),
                semitones,
                format!("instrumental {} moved onto vocal key {}", bed.profile.key, vocal.profile.key),
            );
        }

        let tempo = plan_tempo(vocal, bed, &config.stretch, log)?;
        Ok(KeyPlan {
            vocal_id: vocal.id().to_string(),
            instrumental_id: bed.id().to_string(),
            semitones,
            tempo,
        })
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        plan: KeyPlan,
        log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let vocal = material.track(&plan.vocal_id)?;
        let bed_track = material.track(&plan.instrumental_id)?;
        let mut bed = bed_track.instrumental()?;
        if plan.semitones != 0 {
            bed = pitch_shift(&bed, plan.semitones)?;
        }
        vocal_over_bed(config, vocal, bed_track, bed, &plan.tempo, log)
    }

    fn output_name(&self) -> String {
        format!(
            "key_corrected_{}_x_{}.wav",
            file_part(&self.vocal_id),
            file_part(&self.instrumental_id)
        )
    }
}
