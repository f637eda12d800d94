//! Stems from two to four tracks, conformed to the drums track

use crate::alignment::align_downbeats;
use crate::config::MixerConfig;
use crate::engineer::material::conform_tempo;
use crate::engineer::{
    file_part, Arrangement, DecisionLog, Layer, Material, SourceRequest, Strategy, StrategyKind,
};
use crate::error::{MashupError, Result};
use crate::harmony::{validate_stretch, TempoMatch};
use mixer_common::{fade_out_tail, StemName};
use std::collections::BTreeMap;

const MIN_TRACKS: usize = 2;
const MAX_TRACKS: usize = 4;

pub struct StemAssembly {
    roles: BTreeMap<StemName, String>,
}

impl StemAssembly {
    pub fn new(roles: BTreeMap<StemName, String>) -> Self {
        Self { roles }
    }

    /// Distinct track ids in role order
    fn track_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for id in self.roles.values() {
            if !ids.contains(&id.as_str()) {
                ids.push(id);
            }
        }
        ids
    }

    fn reference_id(&self) -> Result<&str> {
        self.roles
            .get(&StemName::Drums)
            .map(String::as_str)
            .ok_or_else(|| MashupError::InvalidJob("stem assembly needs a drums role as the tempo reference".into()))
    }
}

impl Strategy for StemAssembly {
    type Selection = Vec<(StemName, String, TempoMatch)>;

    fn kind(&self) -> StrategyKind {
        StrategyKind::StemAssembly
    }

    fn validate(&self) -> Result<()> {
        self.reference_id()?;
        if self.roles.values().any(|id| id.trim().is_empty()) {
            return Err(MashupError::InvalidJob("track ids must not be empty".into()));
        }
        let tracks = self.track_ids().len();
        if !(MIN_TRACKS..=MAX_TRACKS).contains(&tracks) {
            return Err(MashupError::InvalidJob(format!(
                "stem assembly takes {} to {} distinct tracks, got {}",
                MIN_TRACKS, MAX_TRACKS, tracks
            )));
        }
        Ok(())
    }

    fn sources(&self) -> Vec<SourceRequest> {
        self.track_ids().into_iter().map(SourceRequest::stems).collect()
    }

    fn select_material(
        &self,
        config: &MixerConfig,
        material: &Material,
        log: &mut DecisionLog,
    ) -> Result<Self::Selection> {
        let reference = material.track(self.reference_id()?)?;
        let mut selection = Vec::with_capacity(self.roles.len());

        for (&name, id) in &self.roles {
            let track = material.track(id)?;
            track.stem(name)?;
            let role = if name == StemName::Drums {
                "tempo reference".to_string()
            } else {
                format!("{} over {}", name, reference.id())
            };
            log.stem(track.id(), name, role);

            let tempo = validate_stretch(track.profile.bpm, reference.profile.bpm, &config.stretch)
                .map_err(|e| e.with_pair(track.id(), reference.id()))?;
            if track.id() != reference.id() {
                log.stretch(track.id(), track.profile.bpm, reference.profile.bpm, &tempo);
            }
            selection.push((name, id.clone(), tempo));
        }
        Ok(selection)
    }

    fn transform(
        &self,
        config: &MixerConfig,
        material: &Material,
        selection: Self::Selection,
        log: &mut DecisionLog,
    ) -> Result<Arrangement> {
        let reference = material.track(self.reference_id()?)?;
        let drums = reference.stem(StemName::Drums)?;
        let mut layers = Vec::with_capacity(selection.len());

        for (name, id, tempo) in selection {
            let track = material.track(&id)?;
            let stem = track.stem(name)?;
            if track.id() == reference.id() {
                layers.push(Layer {
                    buffer: stem.clone(),
                    gain: 1.0,
                });
                continue;
            }

            let stretched = conform_tempo(stem, track.profile.bpm, reference.profile.bpm, &config.stretch)?;
            let aligned = align_downbeats(
                &stretched,
                track.profile.first_downbeat_sec,
                drums,
                reference.profile.first_downbeat_sec,
                tempo.ratio,
            )?;
            log.alignment(track.id(), reference.id(), aligned.info());

            let mut buffer = aligned.a;
            if aligned.short_overlap {
                fade_out_tail(&mut buffer, config.engineer.fade_duration_sec, config.engineer.fade_curve);
                log.fallback(
                    "transform",
                    format!("{} stem from {} is short against the drums: faded out", name, track.id()),
                );
            }
            layers.push(Layer { buffer, gain: 1.0 });
        }

        Ok(Arrangement::Layers(layers))
    }

    fn output_name(&self) -> String {
        let ids: Vec<String> = self.track_ids().into_iter().map(file_part).collect();
        format!("stem_swap_{}.wav", ids.join("_x_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(pairs: &[(StemName, &str)]) -> BTreeMap<StemName, String> {
        pairs.iter().map(|(n, id)| (*n, id.to_string())).collect()
    }

    #[test]
    fn test_requires_drums_reference() {
        let job = StemAssembly::new(roles(&[(StemName::Vocals, "a"), (StemName::Bass, "b")]));
        assert!(matches!(job.validate(), Err(MashupError::InvalidJob(_))));
    }

    #[test]
    fn test_track_count_bounds() {
        let single = StemAssembly::new(roles(&[(StemName::Vocals, "a"), (StemName::Drums, "a")]));
        assert!(single.validate().is_err());

        let ok = StemAssembly::new(roles(&[
            (StemName::Vocals, "a"),
            (StemName::Drums, "b"),
            (StemName::Bass, "c"),
            (StemName::Other, "b"),
        ]));
        assert!(ok.validate().is_ok());
        assert_eq!(ok.sources().len(), 3);
        assert_eq!(ok.output_name(), "stem_swap_a_x_b_x_c.wav");
    }
}
