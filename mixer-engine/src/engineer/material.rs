//! Loaded track material: profile plus audio, at the project sample rate

use super::decisions::MaterialLayer;
use crate::alignment::stretch_to_tempo;
use crate::config::StretchConfig;
use crate::dsp::resample_buffer;
use crate::error::{MashupError, Result};
use mixer_common::{AudioBuffer, Section, StemName, StemSet, TrackProfile};
use std::collections::BTreeMap;

/// How much separated audio a strategy needs from a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemNeed {
    /// Full mix only
    None,
    /// Full mix, plus stems when separation has run
    Optional,
    /// Stems; the full mix is their sum
    Required,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub track_id: String,
    pub stems: StemNeed,
}

impl SourceRequest {
    pub fn stems(track_id: &str) -> Self {
        Self {
            track_id: track_id.to_string(),
            stems: StemNeed::Required,
        }
    }
}

/// One track ready for composition
#[derive(Debug, Clone)]
pub struct TrackAudio {
    pub profile: TrackProfile,
    pub mix: AudioBuffer,
    pub stems: Option<StemSet>,
}

impl TrackAudio {
    pub fn new(profile: TrackProfile, mix: AudioBuffer, stems: Option<StemSet>) -> Self {
        Self { profile, mix, stems }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn sections(&self) -> &[Section] {
        &self.profile.sections
    }

    pub fn section(&self, index: usize) -> Result<&Section> {
        self.profile.sections.get(index).ok_or_else(|| MashupError::InvalidProfile {
            id: self.profile.id.clone(),
            reason: format!("no section at index {}", index),
        })
    }

    pub fn has_stems(&self) -> bool {
        self.stems.is_some()
    }

    fn stem_set(&self) -> Result<&StemSet> {
        self.stems
            .as_ref()
            .ok_or_else(|| MashupError::StemsUnavailable { id: self.id().to_string() })
    }

    pub fn stem(&self, name: StemName) -> Result<&AudioBuffer> {
        self.stem_set()?
            .get(name)
            .ok_or_else(|| MashupError::StemsUnavailable { id: self.id().to_string() })
    }

    pub fn vocals(&self) -> Result<&AudioBuffer> {
        self.stem(StemName::Vocals)
    }

    pub fn instrumental(&self) -> Result<AudioBuffer> {
        self.stem_set()?
            .instrumental()
            .ok_or_else(|| MashupError::StemsUnavailable { id: self.id().to_string() })
    }

    pub fn layer(&self, layer: MaterialLayer) -> Result<AudioBuffer> {
        match layer {
            MaterialLayer::Mix => Ok(self.mix.clone()),
            MaterialLayer::Vocals => self.vocals().cloned(),
            MaterialLayer::Instrumental => self.instrumental(),
        }
    }

    /// Audio of one section in the given layer, at the track's own tempo
    pub fn section_audio(&self, index: usize, layer: MaterialLayer) -> Result<AudioBuffer> {
        let section = self.section(index)?;
        self.span_audio(section.start_sec, section.end_sec, layer)
    }

    pub fn span_audio(&self, start_sec: f64, end_sec: f64, layer: MaterialLayer) -> Result<AudioBuffer> {
        match layer {
            MaterialLayer::Mix => Ok(self.mix.slice_secs(start_sec, end_sec)),
            MaterialLayer::Vocals => Ok(self.vocals()?.slice_secs(start_sec, end_sec)),
            MaterialLayer::Instrumental => Ok(self.instrumental()?.slice_secs(start_sec, end_sec)),
        }
    }

    /// Fails with `MissingSections` when the profile was never section-analyzed
    pub fn require_sections(&self, strategy: &str) -> Result<()> {
        if self.profile.has_sections() {
            Ok(())
        } else {
            Err(MashupError::MissingSections {
                id: self.id().to_string(),
                strategy: strategy.to_string(),
            })
        }
    }

    fn conform(self, sample_rate: u32) -> Result<Self> {
        let mix = resample_buffer(self.mix, sample_rate)?;
        let stems = match self.stems {
            Some(set) => {
                let mut stems = BTreeMap::new();
                for (name, buffer) in set.stems {
                    stems.insert(name, resample_buffer(buffer, sample_rate)?);
                }
                Some(StemSet::new(stems))
            }
            None => None,
        };
        Ok(Self {
            profile: self.profile,
            mix,
            stems,
        })
    }
}

/// Every track a job needs, keyed by id
#[derive(Debug, Clone)]
pub struct Material {
    sample_rate: u32,
    tracks: BTreeMap<String, TrackAudio>,
}

impl Material {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            tracks: BTreeMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn insert(&mut self, track: TrackAudio) {
        self.tracks.insert(track.id().to_string(), track);
    }

    pub fn track(&self, id: &str) -> Result<&TrackAudio> {
        self.tracks
            .get(id)
            .ok_or_else(|| MashupError::ProfileNotFound { id: id.to_string() })
    }

    /// Resample every buffer to `sample_rate`
    pub fn conform(self, sample_rate: u32) -> Result<Self> {
        let mut tracks = BTreeMap::new();
        for (id, track) in self.tracks {
            tracks.insert(id, track.conform(sample_rate)?);
        }
        Ok(Self { sample_rate, tracks })
    }
}

/// Stretch `buffer` from `source_bpm` to `target_bpm`; equal tempos are a copy
pub fn conform_tempo(
    buffer: &AudioBuffer,
    source_bpm: f64,
    target_bpm: f64,
    limits: &StretchConfig,
) -> Result<AudioBuffer> {
    if (source_bpm - target_bpm).abs() < f64::EPSILON {
        return Ok(buffer.clone());
    }
    let (stretched, _) = stretch_to_tempo(buffer, source_bpm, target_bpm, limits)?;
    Ok(stretched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(with_stems: bool) -> TrackAudio {
        let profile: TrackProfile = serde_json::from_value(serde_json::json!({
            "id": "t", "bpm": 120.0, "key": "8B",
            "sections": [
                {"section_type": "verse", "start_sec": 0.0, "end_sec": 1.0},
                {"section_type": "chorus", "start_sec": 1.0, "end_sec": 2.0}
            ]
        }))
        .unwrap();
        let mix = AudioBuffer::new(vec![0.5; 200], 100);
        let stems = with_stems.then(|| {
            let mut map = BTreeMap::new();
            map.insert(StemName::Vocals, AudioBuffer::new(vec![0.25; 200], 100));
            map.insert(StemName::Drums, AudioBuffer::new(vec![0.25; 200], 100));
            StemSet::new(map)
        });
        TrackAudio::new(profile, mix, stems)
    }

    #[test]
    fn test_section_audio_by_layer() {
        let t = track(true);
        assert_eq!(t.section_audio(1, MaterialLayer::Mix).unwrap().len(), 100);
        assert_eq!(t.section_audio(0, MaterialLayer::Vocals).unwrap().samples[0], 0.25);
        assert!(t.section_audio(5, MaterialLayer::Mix).is_err());
    }

    #[test]
    fn test_missing_stems_reported() {
        let t = track(false);
        assert!(matches!(
            t.section_audio(0, MaterialLayer::Instrumental),
            Err(MashupError::StemsUnavailable { .. })
        ));
        assert!(t.section_audio(0, MaterialLayer::Mix).is_ok());
    }

    #[test]
    fn test_conform_resamples_everything() {
        let mut material = Material::new(100);
        material.insert(track(true));
        let conformed = material.conform(200).unwrap();
        let t = conformed.track("t").unwrap();
        assert_eq!(t.mix.sample_rate, 200);
        assert_eq!(t.vocals().unwrap().sample_rate, 200);
        assert!(conformed.track("missing").is_err());
    }

    #[test]
    fn test_conform_tempo_identity_is_copy() {
        let buf = AudioBuffer::new(vec![0.1; 1000], 8000);
        let out = conform_tempo(&buf, 120.0, 120.0, &StretchConfig::default()).unwrap();
        assert_eq!(out, buf);
        assert!(conform_tempo(&buf, 100.0, 135.0, &StretchConfig::default()).is_err());
    }
}
