//! Vocals of one track over the instrumental of another

use super::{plan_tempo, validate_two_tracks, vocal_over_bed};
use crate::config::MixerConfig;
use crate::engineer::{file_part, Arrangement, DecisionLog, Material, SourceRequest, Strategy, StrategyKind};
use crate::error::Result;
use crate::harmony::TempoMatch;
use mixer_common::StemName;

pub struct DirectSwap {
    vocal_id: String,
    instrumental_id: String,
}

impl DirectSwap {
    pub fn new(vocal_id: String, instrumental_id: String) -> Self {
        Self {
            vocal_id,
            instrumental_id,
        }
    }
}

impl Strategy for DirectSwap {
    type Selection = TempoMatch;

    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectSwap
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
    ) -> Result<TempoMatch> {
        let vocal = material.track(&self.vocal_id)?;
        let bed = material.track(&self.instrumental_id)?;

        vocal.vocals()?;
        if !vocal.profile.has_vocals {
            log.warning(format!(
                "{} is profiled without vocals; its vocal stem may be near silent",
                vocal.id()
            ));
        }

        log.stem(vocal.id(), StemName::Vocals, "lead vocal");
        if let Some(stems) = &bed.stems {
            for name in stems.names().into_iter().filter(|n| *n != StemName::Vocals) {
                log.stem(bed.id(), name, "instrumental bed");
            }
        }

        plan_tempo(vocal, bed, &config.stretch, log)
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        tempo: TempoMatch,
        log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let vocal = material.track(&self.vocal_id)?;
        let bed_track = material.track(&self.instrumental_id)?;
        let bed = bed_track.instrumental()?;
        vocal_over_bed(config, vocal, bed_track, bed, &tempo, log)
    }

    fn output_name(&self) -> String {
        format!(
            "{}_x_{}.wav",
            file_part(&self.vocal_id),
            file_part(&self.instrumental_id)
        )
    }
}
