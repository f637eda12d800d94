//! The eight composition strategies and the helpers they share
//!
//! Two-track section strategies conform track B to track A's tempo; A is never
//! stretched. Section picks are logged in source order (all of A, then all of B)
//! whatever order they are played in.

pub mod dialogue;
pub mod direct_swap;
pub mod energy_matched;
pub mod key_corrected;
pub mod role_aware;
pub mod semantic_arc;
pub mod stem_assembly;
pub mod theme_filtered;

use super::decisions::{DecisionLog, MaterialLayer};
use super::file_part;
use super::material::{conform_tempo, Material, SourceRequest, StemNeed, TrackAudio};
use super::mixdown::{Arrangement, Layer};
use crate::alignment::align_downbeats;
use crate::config::{MixerConfig, StretchConfig};
use crate::error::{MashupError, Result};
use crate::harmony::{validate_stretch, TempoMatch};
use mixer_common::{db_to_gain, fade_out_tail, AudioBuffer};

/// Which track of a two-track job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    A,
    B,
}

/// One section of one side; orders by source position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pick {
    pub side: Side,
    pub index: usize,
}

impl Pick {
    pub fn a(index: usize) -> Self {
        Self { side: Side::A, index }
    }

    pub fn b(index: usize) -> Self {
        Self { side: Side::B, index }
    }
}

/// Track ids of a two-track job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub track_a: String,
    pub track_b: String,
}

impl Pair {
    pub fn new(track_a: String, track_b: String) -> Self {
        Self { track_a, track_b }
    }

    pub fn validate(&self) -> Result<()> {
        validate_two_tracks(&self.track_a, &self.track_b)
    }

    pub fn sources(&self, stems: StemNeed) -> Vec<SourceRequest> {
        [&self.track_a, &self.track_b]
            .into_iter()
            .map(|id| SourceRequest {
                track_id: id.clone(),
                stems,
            })
            .collect()
    }

    pub fn id(&self, side: Side) -> &str {
        match side {
            Side::A => &self.track_a,
            Side::B => &self.track_b,
        }
    }

    pub fn track<'m>(&self, material: &'m Material, side: Side) -> Result<&'m TrackAudio> {
        material.track(self.id(side))
    }

    /// Both tracks, failing unless each carries section metadata
    pub fn sectioned<'m>(
        &self,
        material: &'m Material,
        strategy: &str,
    ) -> Result<(&'m TrackAudio, &'m TrackAudio)> {
        let a = self.track(material, Side::A)?;
        let b = self.track(material, Side::B)?;
        a.require_sections(strategy)?;
        b.require_sections(strategy)?;
        Ok((a, b))
    }

    pub fn output_name(&self, prefix: &str) -> String {
        format!(
            "{}_{}_x_{}.wav",
            prefix,
            file_part(&self.track_a),
            file_part(&self.track_b)
        )
    }

    /// Section audio stretched to side A's tempo
    pub fn render(
        &self,
        material: &Material,
        pick: Pick,
        layer: MaterialLayer,
        limits: &StretchConfig,
    ) -> Result<AudioBuffer> {
        let track = self.track(material, pick.side)?;
        let target_bpm = self.track(material, Side::A)?.profile.bpm;
        let audio = track.section_audio(pick.index, layer)?;
        conform_tempo(&audio, track.profile.bpm, target_bpm, limits)
    }

    /// Log picks in source order
    pub fn log_picks(
        &self,
        material: &Material,
        picks: &[(Pick, MaterialLayer, String)],
        log: &mut DecisionLog,
    ) -> Result<()> {
        let mut ordered: Vec<&(Pick, MaterialLayer, String)> = picks.iter().collect();
        ordered.sort_by_key(|(pick, _, _)| *pick);
        for (pick, layer, detail) in ordered {
            let track = self.track(material, pick.side)?;
            let section = track.section(pick.index)?;
            log.section(track.id(), pick.index, section, *layer, detail.clone());
        }
        Ok(())
    }
}

pub(crate) fn validate_two_tracks(first: &str, second: &str) -> Result<()> {
    if first.trim().is_empty() || second.trim().is_empty() {
        return Err(MashupError::InvalidJob("track ids must not be empty".into()));
    }
    if first == second {
        return Err(MashupError::InvalidJob(format!(
            "a mashup needs two different tracks, got '{}' twice",
            first
        )));
    }
    Ok(())
}

/// Validate and log the stretch that brings `source` to `target`'s tempo
pub(crate) fn plan_tempo(
    source: &TrackAudio,
    target: &TrackAudio,
    limits: &StretchConfig,
    log: &mut DecisionLog,
) -> Result<TempoMatch> {
    let tempo = validate_stretch(source.profile.bpm, target.profile.bpm, limits)
        .map_err(|e| e.with_pair(source.id(), target.id()))?;
    log.stretch(source.id(), source.profile.bpm, target.profile.bpm, &tempo);
    Ok(tempo)
}

/// Vocals of one track over an instrumental bed from another
///
/// The vocals are stretched to the bed's tempo and aligned on the first downbeat. A
/// short overlap fades out instead of cutting. Both layers are peak-matched before
/// the vocal attenuation is applied.
pub(crate) fn vocal_over_bed(
    config: &MixerConfig,
    vocal_track: &TrackAudio,
    bed_track: &TrackAudio,
    bed: AudioBuffer,
    tempo: &TempoMatch,
    log: &mut DecisionLog,
) -> Result<Arrangement> {
    let vocals = conform_tempo(
        vocal_track.vocals()?,
        vocal_track.profile.bpm,
        bed_track.profile.bpm,
        &config.stretch,
    )?;

    let aligned = align_downbeats(
        &vocals,
        vocal_track.profile.first_downbeat_sec,
        &bed,
        bed_track.profile.first_downbeat_sec,
        tempo.ratio,
    )?;
    log.alignment(vocal_track.id(), bed_track.id(), aligned.info());

    let mut vox = aligned.a;
    let mut inst = aligned.b;
    if aligned.short_overlap {
        let engineer = &config.engineer;
        fade_out_tail(&mut vox, engineer.fade_duration_sec, engineer.fade_curve);
        fade_out_tail(&mut inst, engineer.fade_duration_sec, engineer.fade_curve);
        log.fallback(
            "transform",
            format!(
                "short overlap between {} and {}: {:.1}s fade-out instead of a hard cut",
                vocal_track.id(),
                bed_track.id(),
                engineer.fade_duration_sec
            ),
        );
    }

    vox.normalize_peak(1.0);
    inst.normalize_peak(1.0);

    Ok(Arrangement::Layers(vec![
        Layer {
            buffer: inst,
            gain: 1.0,
        },
        Layer {
            buffer: vox,
            gain: db_to_gain(config.engineer.vocal_attenuation_db),
        },
    ]))
}

/// Sum vocal and bed sections with fixed gains, cut to the shorter
pub(crate) fn blend(vocal: &AudioBuffer, vocal_gain: f32, bed: &AudioBuffer, bed_gain: f32) -> AudioBuffer {
    let len = vocal.len().min(bed.len());
    let samples = vocal.samples[..len]
        .iter()
        .zip(&bed.samples[..len])
        .map(|(v, b)| v * vocal_gain + b * bed_gain)
        .collect();
    AudioBuffer::new(samples, vocal.sample_rate)
}
