//! Downbeat alignment of two buffers
//!
//! Buffer A is assumed to have been time-stretched by `ratio` (a playback rate), so its
//! first downbeat moved from `first_beat_a` to `first_beat_a / ratio`. A is then padded or
//! trimmed so that downbeat lands on B's, and both are cut to a common length.

use crate::config::StretchConfig;
use crate::dsp::time_stretch;
use crate::error::{MashupError, Result};
use crate::harmony::{validate_stretch, TempoMatch};
use mixer_common::AudioBuffer;
use serde::Serialize;
use tracing::{debug, warn};

/// Shorter buffer below this fraction of the longer one counts as a short overlap
pub const SHORT_OVERLAP_FRACTION: f64 = 0.8;

/// Two buffers of equal length whose first downbeats coincide
#[derive(Debug, Clone)]
pub struct AlignedPair {
    pub a: AudioBuffer,
    pub b: AudioBuffer,
    /// Positive: A was padded with leading silence. Negative: A's head was trimmed
    pub offset_samples: i64,
    /// The caller should fade the tail instead of cutting abruptly
    pub short_overlap: bool,
}

/// Summary of an alignment for decision logs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignmentInfo {
    pub offset_samples: i64,
    pub aligned_len: usize,
    pub short_overlap: bool,
}

impl AlignedPair {
    pub fn info(&self) -> AlignmentInfo {
        AlignmentInfo {
            offset_samples: self.offset_samples,
            aligned_len: self.a.len(),
            short_overlap: self.short_overlap,
        }
    }
}

/// Samples A must move so its stretched first downbeat meets B's
pub fn downbeat_offset_samples(first_beat_a: f64, first_beat_b: f64, ratio: f64, sample_rate: u32) -> i64 {
    let scaled_a = first_beat_a / ratio;
    ((first_beat_b - scaled_a) * sample_rate as f64).round() as i64
}

/// Pad (positive offset) or trim (negative offset) the head of a buffer
pub fn shift_by_offset(buffer: &AudioBuffer, offset_samples: i64) -> AudioBuffer {
    if offset_samples > 0 {
        let mut samples = vec![0.0; offset_samples as usize];
        samples.extend_from_slice(&buffer.samples);
        AudioBuffer::new(samples, buffer.sample_rate)
    } else {
        let trim = (offset_samples.unsigned_abs() as usize).min(buffer.len());
        AudioBuffer::new(buffer.samples[trim..].to_vec(), buffer.sample_rate)
    }
}

/// Align stretched buffer A to buffer B by first downbeat
///
/// Both outputs have equal length, never longer than either input.
pub fn align_downbeats(
    stretched_a: &AudioBuffer,
    first_beat_a: f64,
    b: &AudioBuffer,
    first_beat_b: f64,
    ratio: f64,
) -> Result<AlignedPair> {
    if stretched_a.sample_rate != b.sample_rate {
        return Err(MashupError::audio(
            "align",
            format!(
                "sample rates differ ({} vs {})",
                stretched_a.sample_rate, b.sample_rate
            ),
        ));
    }
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(MashupError::audio("align", format!("invalid ratio {}", ratio)));
    }

    let offset_samples = downbeat_offset_samples(first_beat_a, first_beat_b, ratio, b.sample_rate);
    let shifted = shift_by_offset(stretched_a, offset_samples);

    let shorter = shifted.len().min(b.len());
    let longer = shifted.len().max(b.len());
    let common = shorter.min(stretched_a.len()).min(b.len());
    let short_overlap = longer > 0 && (shorter as f64) < SHORT_OVERLAP_FRACTION * longer as f64;

    let mut a_out = shifted;
    a_out.truncate(common);
    let mut b_out = b.clone();
    b_out.truncate(common);

    debug!(
        offset_samples,
        aligned_len = common,
        short_overlap,
        "Aligned downbeats"
    );

    Ok(AlignedPair {
        a: a_out,
        b: b_out,
        offset_samples,
        short_overlap,
    })
}

/// Stretch a buffer from `source_bpm` to `target_bpm`, rejecting out-of-bounds ratios
pub fn stretch_to_tempo(
    buffer: &AudioBuffer,
    source_bpm: f64,
    target_bpm: f64,
    limits: &StretchConfig,
) -> Result<(AudioBuffer, TempoMatch)> {
    let tempo = validate_stretch(source_bpm, target_bpm, limits)?;
    if tempo.quality_risk {
        warn!(
            ratio = tempo.ratio,
            source_bpm, target_bpm, "Stretch ratio in quality-risk band"
        );
    }
    let samples = time_stretch(&buffer.samples, buffer.sample_rate, tempo.ratio)?;
    Ok((AudioBuffer::new(samples, buffer.sample_rate), tempo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(len: usize) -> AudioBuffer {
        AudioBuffer::new((0..len).map(|i| i as f32).collect(), 100)
    }

    #[test]
    fn test_offset_sign() {
        // A's beat lands later than B's after stretching: trim A
        assert_eq!(downbeat_offset_samples(1.0, 0.5, 1.0, 100), -50);
        // A's beat lands earlier: pad A
        assert_eq!(downbeat_offset_samples(0.5, 1.0, 1.0, 100), 50);
        // Speeding up by 2 halves A's beat time
        assert_eq!(downbeat_offset_samples(1.0, 1.0, 2.0, 100), 50);
    }

    #[test]
    fn test_positive_offset_pads() {
        let a = buf(100);
        let b = buf(200);
        let pair = align_downbeats(&a, 0.0, &b, 0.3, 1.0).unwrap();
        assert_eq!(pair.offset_samples, 30);
        assert_eq!(pair.a.samples[..30], [0.0; 30]);
        assert_eq!(pair.a.samples[30], 0.0);
        assert_eq!(pair.a.samples[31], 1.0);
    }

    #[test]
    fn test_negative_offset_trims() {
        let a = buf(100);
        let b = buf(100);
        let pair = align_downbeats(&a, 0.2, &b, 0.0, 1.0).unwrap();
        assert_eq!(pair.offset_samples, -20);
        assert_eq!(pair.a.samples[0], 20.0);
        assert_eq!(pair.a.len(), 80);
    }

    #[test]
    fn test_lengths_equal_and_bounded() {
        for (len_a, len_b, fb_a, fb_b) in [
            (100, 300, 0.0, 0.5),
            (300, 100, 0.7, 0.1),
            (250, 250, 0.25, 0.25),
            (50, 400, 0.0, 3.0),
            (400, 50, 3.0, 0.0),
        ] {
            let a = buf(len_a);
            let b = buf(len_b);
            let pair = align_downbeats(&a, fb_a, &b, fb_b, 1.0).unwrap();
            assert_eq!(pair.a.len(), pair.b.len());
            assert!(pair.a.len() <= len_a.min(len_b));
        }
    }

    #[test]
    fn test_short_overlap_flag() {
        let pair = align_downbeats(&buf(70), 0.0, &buf(100), 0.0, 1.0).unwrap();
        assert!(pair.short_overlap);
        let pair = align_downbeats(&buf(90), 0.0, &buf(100), 0.0, 1.0).unwrap();
        assert!(!pair.short_overlap);
    }

    #[test]
    fn test_sample_rate_mismatch() {
        let a = AudioBuffer::new(vec![0.0; 10], 100);
        let b = AudioBuffer::new(vec![0.0; 10], 200);
        assert!(align_downbeats(&a, 0.0, &b, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_stretch_to_tempo_rejects_out_of_bounds() {
        let a = AudioBuffer::new(vec![0.0; 800], 8000);
        let err = stretch_to_tempo(&a, 100.0, 135.0, &StretchConfig::default()).unwrap_err();
        assert!(matches!(err, MashupError::StretchRatioOutOfBounds { .. }));

        let (out, tempo) = stretch_to_tempo(&a, 100.0, 125.0, &StretchConfig::default()).unwrap();
        assert_eq!(out.len(), 640);
        assert!(tempo.quality_risk);
    }
}
