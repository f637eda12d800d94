//! Rendering arrangements to a single buffer, and final mastering

use crate::error::Result;
use mixer_common::{crossfade_append, db_to_gain, AudioBuffer, FadeCurve};

/// Simultaneous material, summed with a per-layer gain
#[derive(Debug, Clone)]
pub struct Layer {
    pub buffer: AudioBuffer,
    pub gain: f32,
}

/// How a segment attaches to what precedes it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Join {
    Cut,
    Crossfade(f64),
    /// Seconds of silence before the segment
    Gap(f64),
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub buffer: AudioBuffer,
    pub join: Join,
}

impl Segment {
    pub fn new(buffer: AudioBuffer, join: Join) -> Self {
        Self { buffer, join }
    }
}

/// Output of a strategy's transform stage
#[derive(Debug, Clone)]
pub enum Arrangement {
    /// Summed and cut to the shortest layer
    Layers(Vec<Layer>),
    /// Played back to back
    Sequence(Vec<Segment>),
}

pub fn render(arrangement: Arrangement, curve: FadeCurve, sample_rate: u32) -> Result<AudioBuffer> {
    match arrangement {
        Arrangement::Layers(layers) => {
            let len = layers.iter().map(|l| l.buffer.len()).min().unwrap_or(0);
            let mut out = AudioBuffer::new(vec![0.0; len], sample_rate);
            for layer in &layers {
                for (dst, src) in out.samples.iter_mut().zip(layer.buffer.samples.iter()) {
                    *dst += src * layer.gain;
                }
            }
            Ok(out)
        }
        Arrangement::Sequence(segments) => {
            let mut out = AudioBuffer::new(Vec::new(), sample_rate);
            for segment in &segments {
                if out.is_empty() {
                    out.append(&segment.buffer);
                    continue;
                }
                match segment.join {
                    Join::Cut => out.append(&segment.buffer),
                    Join::Crossfade(secs) => crossfade_append(&mut out, &segment.buffer, secs, curve),
                    Join::Gap(secs) => {
                        out.append(&AudioBuffer::silence(secs, sample_rate));
                        out.append(&segment.buffer);
                    }
                }
            }
            Ok(out)
        }
    }
}

/// Peak-normalise to `-headroom_db` dBFS
pub fn master(mut buffer: AudioBuffer, headroom_db: f32) -> AudioBuffer {
    buffer.normalize_peak(db_to_gain(-headroom_db.abs()));
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: f32, len: usize) -> AudioBuffer {
        AudioBuffer::new(vec![value; len], 100)
    }

    #[test]
    fn test_layers_sum_to_shortest() {
        let out = render(
            Arrangement::Layers(vec![
                Layer { buffer: constant(0.5, 10), gain: 1.0 },
                Layer { buffer: constant(0.5, 8), gain: 0.5 },
            ]),
            FadeCurve::Linear,
            100,
        )
        .unwrap();
        assert_eq!(out.len(), 8);
        assert!((out.samples[0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_sequence_joins() {
        let out = render(
            Arrangement::Sequence(vec![
                Segment::new(constant(1.0, 50), Join::Gap(1.0)),
                Segment::new(constant(1.0, 50), Join::Gap(0.5)),
                Segment::new(constant(1.0, 50), Join::Cut),
                Segment::new(constant(1.0, 50), Join::Crossfade(0.2)),
            ]),
            FadeCurve::Linear,
            100,
        )
        .unwrap();
        // Leading gap ignored, 50-sample gap, 20-sample overlap
        assert_eq!(out.len(), 50 + 50 + 50 + 50 + 50 - 20);
        assert_eq!(out.samples[60], 0.0);
    }

    #[test]
    fn test_master_peak() {
        let out = master(AudioBuffer::new(vec![0.1, -0.4, 0.2], 100), 2.0);
        assert!((out.peak() - db_to_gain(-2.0)).abs() < 1e-6);
    }
}
