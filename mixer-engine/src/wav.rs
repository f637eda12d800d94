//! WAV file input/output using hound

use crate::error::{MashupError, Result};
use mixer_common::AudioBuffer;
use std::path::Path;

/// Read a WAV file and down-mix it to mono
pub fn read_wav_mono(path: &Path) -> Result<AudioBuffer> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| MashupError::audio("load", format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MashupError::audio("load", e))?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| MashupError::audio("load", e))?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(AudioBuffer::new(samples, spec.sample_rate))
}

/// Write mono material as 16-bit PCM, duplicated across `channels`
pub fn write_wav_16(path: &Path, buffer: &AudioBuffer, channels: u16) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let map_err = |e: hound::Error| MashupError::audio("export", format!("{}: {}", path.display(), e));
    let mut writer = hound::WavWriter::create(path, spec).map_err(map_err)?;
    for sample in &buffer.samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        for _ in 0..channels {
            writer.write_sample(value).map_err(map_err)?;
        }
    }
    writer.finalize().map_err(map_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_downmixes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.0], 8000);

        write_wav_16(&path, &buffer, 2).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.len(), 8);

        let loaded = read_wav_mono(&path).unwrap();
        assert_eq!(loaded.sample_rate, 8000);
        assert_eq!(loaded.len(), 4);
        assert!((loaded.samples[1] - 0.5).abs() < 1e-3);
        assert!((loaded.samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file() {
        let err = read_wav_mono(Path::new("/nonexistent/file.wav")).unwrap_err();
        assert!(matches!(err, MashupError::Audio { .. }));
    }
}
