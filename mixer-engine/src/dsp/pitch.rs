//! Pitch shifting: WSOLA stretch followed by resampling back to the original length

use super::resampler::resample;
use super::wsola::time_stretch;
use crate::error::{MashupError, Result};
use mixer_common::AudioBuffer;

/// Transpose by `semitones` keeping duration
pub fn pitch_shift(buffer: &AudioBuffer, semitones: i32) -> Result<AudioBuffer> {
    if semitones == 0 || buffer.is_empty() {
        return Ok(buffer.clone());
    }
    if semitones.abs() > 24 {
        return Err(MashupError::audio(
            "pitch_shift",
            format!("{} semitones is outside the supported range", semitones),
        ));
    }

    let factor = 2f64.powf(semitones as f64 / 12.0);
    // Lengthen by `factor` at constant pitch, then squeeze back: pitch rises by `factor`
    let stretched = time_stretch(&buffer.samples, buffer.sample_rate, 1.0 / factor)?;
    let mut samples = resample(&stretched, 1.0 / factor)?;
    samples.resize(buffer.len(), 0.0);

    Ok(AudioBuffer::new(samples, buffer.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, secs: f32) -> AudioBuffer {
        let n = (sample_rate as f32 * secs) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    fn crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let buf = sine(220.0, 8000, 0.5);
        assert_eq!(pitch_shift(&buf, 0).unwrap(), buf);
    }

    #[test]
    fn test_octave_up_doubles_frequency_keeps_length() {
        let buf = sine(150.0, 8000, 1.0);
        let shifted = pitch_shift(&buf, 12).unwrap();
        assert_eq!(shifted.len(), buf.len());

        let ratio = crossings(&shifted.samples[..7000]) as f64 / crossings(&buf.samples[..7000]) as f64;
        assert!((ratio - 2.0).abs() < 0.25, "ratio {}", ratio);
    }

    #[test]
    fn test_rejects_extreme_shift() {
        let buf = sine(150.0, 8000, 0.1);
        assert!(pitch_shift(&buf, 36).is_err());
    }
}
