//! Fade curves for tail fades and section crossfades

use crate::audio::{secs_to_samples, AudioBuffer};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade curve shapes
///
/// - Linear: constant rate of change
/// - Exponential: slow start, fast finish
/// - Logarithmic: fast start, slow finish
/// - SCurve: smooth acceleration and deceleration
/// - EqualPower: constant perceived loudness through a crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    Linear,
    Exponential,
    Logarithmic,
    SCurve,
    #[default]
    EqualPower,
}

impl FadeCurve {
    /// Fade-in multiplier at normalized position 0.0..=1.0
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Fade-out multiplier at normalized position 0.0..=1.0 (1.0 at start, 0.0 at end)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential | FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }
}

impl std::str::FromStr for FadeCurve {
    type Err = Error;

    /// Accepts the config spellings plus a few common aliases, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "linear" => Ok(FadeCurve::Linear),
            "exponential" => Ok(FadeCurve::Exponential),
            "logarithmic" => Ok(FadeCurve::Logarithmic),
            "s_curve" | "scurve" | "cosine" => Ok(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Ok(FadeCurve::EqualPower),
            other => Err(Error::InvalidInput(format!("unknown fade curve '{}'", other))),
        }
    }
}

/// Fade the last `duration_sec` of the buffer to silence
pub fn fade_out_tail(buffer: &mut AudioBuffer, duration_sec: f64, curve: FadeCurve) {
    let fade_len = secs_to_samples(duration_sec, buffer.sample_rate).min(buffer.len());
    if fade_len == 0 {
        return;
    }
    let start = buffer.len() - fade_len;
    for (i, sample) in buffer.samples[start..].iter_mut().enumerate() {
        let position = (i + 1) as f32 / fade_len as f32;
        *sample *= curve.calculate_fade_out(position);
    }
}

/// Join `next` onto `out` with an overlapping crossfade
///
/// The overlap is limited to the shorter of the two pieces, so very short sections are
/// joined with a proportionally shorter fade.
pub fn crossfade_append(out: &mut AudioBuffer, next: &AudioBuffer, duration_sec: f64, curve: FadeCurve) {
    let overlap = secs_to_samples(duration_sec, out.sample_rate)
        .min(out.len())
        .min(next.len());

    if overlap == 0 {
        out.append(next);
        return;
    }

    let start = out.len() - overlap;
    for i in 0..overlap {
        let position = i as f32 / overlap as f32;
        let faded_out = out.samples[start + i] * curve.calculate_fade_out(position);
        let faded_in = next.samples[i] * curve.calculate_fade_in(position);
        out.samples[start + i] = faded_out + faded_in;
    }
    out.samples.extend_from_slice(&next.samples[overlap..]);
}
