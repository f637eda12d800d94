//! Signal processing for tempo and pitch changes
//!
//! All routines operate on mono f32 material.

pub mod pitch;
pub mod resampler;
pub mod wsola;

pub use pitch::pitch_shift;
pub use resampler::{resample, resample_buffer};
pub use wsola::{time_stretch, Wsola};
