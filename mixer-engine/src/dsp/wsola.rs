//! WSOLA (Waveform Similarity Overlap-Add) time stretching
//!
//! Output segments are laid down at a fixed hop; for each one the input position is
//! searched around its nominal location for the window that best continues the waveform
//! already written, then cross-faded in. Pitch is preserved.

use crate::error::{MashupError, Result};

/// Minimum energy for correlation normalization
const ENERGY_EPSILON: f64 = 1e-12;
const SEGMENT_SEC: f64 = 0.040;
const SEARCH_SEC: f64 = 0.010;
/// Candidate spacing of the coarse correlation pass
const COARSE_STEP: usize = 8;

/// WSOLA processor for one playback rate
pub struct Wsola {
    segment_size: usize,
    overlap_size: usize,
    search_range: usize,
    /// Playback rate: > 1.0 speeds up (shorter output), < 1.0 slows down
    rate: f64,
}

impl Wsola {
    pub fn new(segment_size: usize, search_range: usize, rate: f64) -> Self {
        let segment_size = segment_size.max(4);
        Self {
            segment_size,
            overlap_size: segment_size / 2,
            search_range,
            rate,
        }
    }

    /// 40 ms segments with a 10 ms search window
    pub fn for_sample_rate(sample_rate: u32, rate: f64) -> Self {
        let segment = (sample_rate as f64 * SEGMENT_SEC).round() as usize;
        let search = (sample_rate as f64 * SEARCH_SEC).round() as usize;
        Self::new(segment, search, rate)
    }

    #[inline]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Output length for an input of `input_len` samples
    pub fn output_len(&self, input_len: usize) -> usize {
        (input_len as f64 / self.rate).round() as usize
    }

    /// Stretch a mono signal; inputs shorter than two segments use linear interpolation
    pub fn process(&self, input: &[f32]) -> Vec<f32> {
        let target_len = self.output_len(input.len());
        if input.is_empty() || target_len == 0 {
            return Vec::new();
        }
        if (self.rate - 1.0).abs() < 1e-9 {
            return input.to_vec();
        }
        if input.len() < self.segment_size * 2 {
            return linear_stretch(input, target_len);
        }

        let hop_out = self.segment_size - self.overlap_size;
        let mut output = vec![0.0f32; target_len + self.segment_size];

        output[..self.segment_size].copy_from_slice(&input[..self.segment_size]);
        let mut written = self.segment_size;
        let mut out_pos = hop_out;
        let mut step: usize = 1;

        while out_pos < target_len {
            let nominal = (step as f64 * hop_out as f64 * self.rate).round() as usize;
            if nominal + self.overlap_size > input.len() {
                break;
            }

            let best = self.find_best_position(input, &output, nominal, out_pos);
            let end = self.overlap_add(input, &mut output, best, out_pos);
            written = written.max(end);

            out_pos += hop_out;
            step += 1;
        }

        output.truncate(target_len);
        if written < target_len {
            // Input ran out before the output did; finish on the end of the input
            let missing = target_len - written;
            let tail = &input[input.len().saturating_sub(missing)..];
            output[target_len - tail.len()..].copy_from_slice(tail);
        }
        output
    }

    /// Coarse-to-fine search for the input window most similar to the output overlap
    fn find_best_position(&self, input: &[f32], output: &[f32], nominal: usize, out_pos: usize) -> usize {
        let max_start = input.len().saturating_sub(self.overlap_size);
        let nominal = nominal.min(max_start);
        let search_start = nominal.saturating_sub(self.search_range);
        let search_end = (nominal + self.search_range).min(max_start);

        let overlap_len = self.overlap_size.min(output.len().saturating_sub(out_pos));
        if overlap_len == 0 || search_start >= search_end {
            return nominal;
        }
        let reference = &output[out_pos..out_pos + overlap_len];

        let score = |pos: usize| -> f64 {
            let end = (pos + overlap_len).min(input.len());
            normalized_cross_correlation(reference, &input[pos..end])
        };

        let mut best_pos = nominal;
        let mut best_corr = score(nominal);

        let mut pos = search_start;
        while pos <= search_end {
            let corr = score(pos);
            if corr > best_corr {
                best_corr = corr;
                best_pos = pos;
            }
            pos += COARSE_STEP;
        }

        let fine_start = best_pos.saturating_sub(COARSE_STEP - 1).max(search_start);
        let fine_end = (best_pos + COARSE_STEP - 1).min(search_end);
        for pos in fine_start..=fine_end {
            let corr = score(pos);
            if corr > best_corr {
                best_corr = corr;
                best_pos = pos;
            }
        }

        best_pos
    }

    /// Cross-fade a segment into the output; returns the end index written
    fn overlap_add(&self, input: &[f32], output: &mut [f32], input_pos: usize, output_pos: usize) -> usize {
        let segment_end = (input_pos + self.segment_size).min(input.len());
        let segment_len = segment_end - input_pos;

        let mut last = output_pos;
        for i in 0..segment_len {
            let out_idx = output_pos + i;
            if out_idx >= output.len() {
                break;
            }
            if i < self.overlap_size {
                let fade_in = i as f32 / self.overlap_size as f32;
                output[out_idx] = output[out_idx] * (1.0 - fade_in) + input[input_pos + i] * fade_in;
            } else {
                output[out_idx] = input[input_pos + i];
            }
            last = out_idx + 1;
        }
        last
    }
}

fn normalized_cross_correlation(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    let mut dot = 0.0f64;
    let mut energy_a = 0.0f64;
    let mut energy_b = 0.0f64;
    for i in 0..len {
        let x = a[i] as f64;
        let y = b[i] as f64;
        dot += x * y;
        energy_a += x * x;
        energy_b += y * y;
    }
    let denom = (energy_a * energy_b).sqrt();
    if denom < ENERGY_EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Resample a signal to `target_len` samples by linear interpolation
pub fn linear_stretch(input: &[f32], target_len: usize) -> Vec<f32> {
    if input.is_empty() || target_len == 0 {
        return Vec::new();
    }
    if input.len() == 1 {
        return vec![input[0]; target_len];
    }
    let scale = (input.len() - 1) as f64 / (target_len.max(2) - 1) as f64;
    (0..target_len)
        .map(|i| {
            let pos = i as f64 * scale;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = input[idx.min(input.len() - 1)];
            let b = input[(idx + 1).min(input.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// Change tempo by `rate` without changing pitch
///
/// Output length is `round(len / rate)`.
pub fn time_stretch(input: &[f32], sample_rate: u32, rate: f64) -> Result<Vec<f32>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(MashupError::audio("stretch", format!("invalid rate {}", rate)));
    }
    Ok(Wsola::for_sample_rate(sample_rate, rate).process(input))
}
