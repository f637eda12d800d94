//! Mono audio buffers and stem sets
//!
//! The engine works on mono f32 material at a single project sample rate. Channel
//! duplication happens only at export time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Convert decibels to a linear gain factor
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Mono PCM buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn silence(duration_sec: f64, sample_rate: u32) -> Self {
        let len = secs_to_samples(duration_sec, sample_rate);
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy of the span `[start_sec, end_sec)`, clamped to the buffer bounds
    pub fn slice_secs(&self, start_sec: f64, end_sec: f64) -> AudioBuffer {
        let start = secs_to_samples(start_sec, self.sample_rate).min(self.len());
        let end = secs_to_samples(end_sec, self.sample_rate).clamp(start, self.len());
        AudioBuffer::new(self.samples[start..end].to_vec(), self.sample_rate)
    }

    pub fn truncate(&mut self, len: usize) {
        self.samples.truncate(len);
    }

    /// Pad with trailing silence or truncate to exactly `len` samples
    pub fn fit_to_len(&mut self, len: usize) {
        self.samples.resize(len, 0.0);
    }

    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.samples {
            *s *= gain;
        }
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.apply_gain(gain);
        self
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Scale so the absolute peak equals `target`; silent buffers are left alone
    pub fn normalize_peak(&mut self, target: f32) {
        let peak = self.peak();
        if peak > f32::EPSILON {
            self.apply_gain(target / peak);
        }
    }

    pub fn append(&mut self, other: &AudioBuffer) {
        self.samples.extend_from_slice(&other.samples);
    }

    /// Sum `other` into this buffer starting at sample 0, growing if needed
    pub fn mix_in(&mut self, other: &AudioBuffer, gain: f32) {
        if other.len() > self.len() {
            self.samples.resize(other.len(), 0.0);
        }
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            *dst += src * gain;
        }
    }
}

/// Seconds to whole samples, negative spans clamp to zero
pub fn secs_to_samples(secs: f64, sample_rate: u32) -> usize {
    if secs <= 0.0 {
        return 0;
    }
    (secs * sample_rate as f64).round() as usize
}

/// Separated stem identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemName {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl StemName {
    pub const ALL: [StemName; 4] = [
        StemName::Vocals,
        StemName::Drums,
        StemName::Bass,
        StemName::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemName::Vocals => "vocals",
            StemName::Drums => "drums",
            StemName::Bass => "bass",
            StemName::Other => "other",
        }
    }
}

impl std::fmt::Display for StemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StemName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vocals" | "vocal" => Ok(StemName::Vocals),
            "drums" => Ok(StemName::Drums),
            "bass" => Ok(StemName::Bass),
            "other" => Ok(StemName::Other),
            other => Err(format!("unknown stem '{}'", other)),
        }
    }
}

/// Stems of one track keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StemSet {
    pub stems: BTreeMap<StemName, AudioBuffer>,
}

impl StemSet {
    pub fn new(stems: BTreeMap<StemName, AudioBuffer>) -> Self {
        Self { stems }
    }

    pub fn get(&self, name: StemName) -> Option<&AudioBuffer> {
        self.stems.get(&name)
    }

    pub fn vocals(&self) -> Option<&AudioBuffer> {
        self.get(StemName::Vocals)
    }

    /// Sum of every non-vocal stem, truncated to the shortest of them
    pub fn instrumental(&self) -> Option<AudioBuffer> {
        let beds: Vec<&AudioBuffer> = self
            .stems
            .iter()
            .filter(|(name, _)| **name != StemName::Vocals)
            .map(|(_, buf)| buf)
            .collect();

        let first = beds.first()?;
        let len = beds.iter().map(|b| b.len()).min().unwrap_or(0);
        let mut out = AudioBuffer::new(vec![0.0; len], first.sample_rate);
        for bed in beds {
            for (dst, src) in out.samples.iter_mut().zip(bed.samples.iter()) {
                *dst += src;
            }
        }
        Some(out)
    }

    /// Sum of every stem, truncated to the shortest of them
    pub fn full_mix(&self) -> AudioBuffer {
        let len = self.stems.values().map(|b| b.len()).min().unwrap_or(0);
        let sample_rate = self
            .stems
            .values()
            .next()
            .map(|b| b.sample_rate)
            .unwrap_or(44100);
        let mut out = AudioBuffer::new(vec![0.0; len], sample_rate);
        for stem in self.stems.values() {
            for (dst, src) in out.samples.iter_mut().zip(stem.samples.iter()) {
                *dst += src;
            }
        }
        out
    }

    pub fn names(&self) -> Vec<StemName> {
        self.stems.keys().copied().collect()
    }
}
