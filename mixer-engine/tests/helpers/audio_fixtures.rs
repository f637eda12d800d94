//! Synthetic audio: sine tones, stem sets and WAV files

use mixer_common::{AudioBuffer, StemName, StemSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Low rate keeps stretch and pitch processing fast
pub const TEST_SAMPLE_RATE: u32 = 8000;

pub fn tone(freq: f32, duration_sec: f64, amplitude: f32) -> AudioBuffer {
    let len = (duration_sec * TEST_SAMPLE_RATE as f64).round() as usize;
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / TEST_SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect();
    AudioBuffer::new(samples, TEST_SAMPLE_RATE)
}

/// Four stems of equal length, each a distinct tone
pub fn stem_set(duration_sec: f64) -> StemSet {
    let mut stems = BTreeMap::new();
    stems.insert(StemName::Vocals, tone(440.0, duration_sec, 0.3));
    stems.insert(StemName::Drums, tone(110.0, duration_sec, 0.3));
    stems.insert(StemName::Bass, tone(55.0, duration_sec, 0.2));
    stems.insert(StemName::Other, tone(660.0, duration_sec, 0.1));
    StemSet::new(stems)
}

/// Write a 16-bit WAV with the buffer duplicated across `channels`
pub fn write_test_wav(path: &Path, buffer: &AudioBuffer, channels: u16) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &buffer.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}
