//! Waveshaping.
//!
//! Each transfer function takes the input pushed by `drive`:
//!
//!   output = f(input · drive)
//!
//! | mode  | f(x)                          | character                  |
//! | ----- | ----------------------------- | -------------------------- |
//! | soft  | x / (1 + abs(x))              | warm, gradual saturation   |
//! | hard  | clamp(x, −t, t)               | buzzy, odd harmonics       |
//! | fold  | reflect x back inside ±t      | metallic, wavefolder-style |
//!
//! Drive 1.0 is (nearly) clean; above ~10 is heavy.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistortionMode {
    #[default]
    Soft,
    Hard,
    Fold,
}

impl DistortionMode {
    /// Map a continuous parameter (0, 1, 2) onto a mode.
    pub fn from_index(index: f32) -> Self {
        match index.round() as i32 {
            i if i <= 0 => Self::Soft,
            1 => Self::Hard,
            _ => Self::Fold,
        }
    }
}

#[inline]
pub fn soft_clip(sample: f32, drive: f32) -> f32 {
    let x = sample * drive;
    x / (1.0 + x.abs())
}

#[inline]
pub fn hard_clip(sample: f32, drive: f32, threshold: f32) -> f32 {
    (sample * drive).clamp(-threshold, threshold)
}

/// Reflect the driven signal back inside `±threshold`.
///
/// Closed form (triangle wave of period 4t) so arbitrarily large drive
/// cannot spin in a loop.
#[inline]
pub fn foldback(sample: f32, drive: f32, threshold: f32) -> f32 {
    let t = threshold.max(1e-6);
    let x = sample * drive;
    if !x.is_finite() {
        return 0.0;
    }
    let period = 4.0 * t;
    let shifted = (x + t).rem_euclid(period);
    if shifted < 2.0 * t {
        shifted - t
    } else {
        3.0 * t - shifted
    }
}

#[inline]
pub fn shape(mode: DistortionMode, sample: f32, drive: f32) -> f32 {
    match mode {
        DistortionMode::Soft => soft_clip(sample, drive),
        DistortionMode::Hard => hard_clip(sample, drive, 1.0),
        DistortionMode::Fold => foldback(sample, drive, 1.0),
    }
}
