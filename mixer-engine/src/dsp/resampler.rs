//! Sample rate conversion using rubato

use crate::error::{MashupError, Result};
use mixer_common::AudioBuffer;
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample mono samples by `ratio` (output rate / input rate)
///
/// The whole signal is processed as one chunk and the result is fitted to exactly
/// `round(len * ratio)` samples.
pub fn resample(input: &[f32], ratio: f64) -> Result<Vec<f32>> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(MashupError::audio("resample", format!("invalid ratio {}", ratio)));
    }
    let expected_len = (input.len() as f64 * ratio).round() as usize;
    if input.is_empty() || (ratio - 1.0).abs() < 1e-12 {
        return Ok(input.to_vec());
    }

    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0, // fixed ratio
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| MashupError::audio("resample", format!("failed to create resampler: {}", e)))?;

    let planar_input = vec![input.to_vec()];
    let mut planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| MashupError::audio("resample", e))?;

    let mut output = planar_output.pop().unwrap_or_default();
    output.resize(expected_len, 0.0);

    debug!(
        input_frames = input.len(),
        output_frames = output.len(),
        ratio,
        "Resampled"
    );
    Ok(output)
}

/// Convert a buffer to `target_rate`; a no-op when rates already match
pub fn resample_buffer(buffer: AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.sample_rate == target_rate {
        return Ok(buffer);
    }
    if buffer.sample_rate == 0 {
        return Err(MashupError::audio("resample", "source sample rate is zero"));
    }
    debug!(
        "Resampling from {}Hz to {}Hz",
        buffer.sample_rate, target_rate
    );
    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    let samples = resample(&buffer.samples, ratio)?;
    Ok(AudioBuffer::new(samples, target_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_copy() {
        let buf = AudioBuffer::new(vec![0.1, 0.2, 0.3], 8000);
        let out = resample_buffer(buf.clone(), 8000).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_length_follows_ratio() {
        let input: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.05).sin()).collect();
        let up = resample(&input, 2.0).unwrap();
        assert_eq!(up.len(), 8000);
        let down = resample(&input, 0.5).unwrap();
        assert_eq!(down.len(), 2000);
    }

    #[test]
    fn test_buffer_rate_updated() {
        let buf = AudioBuffer::new(vec![0.0; 1600], 16000);
        let out = resample_buffer(buf, 8000).unwrap();
        assert_eq!(out.sample_rate, 8000);
        assert_eq!(out.len(), 800);
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(resample(&[0.0; 4], 0.0).is_err());
    }
}
