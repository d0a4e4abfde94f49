//! Mixing, panning and smoothing primitives.

/*
Wet/dry
-------

    output = dry · (1 − mix) + wet · mix

Linear weights sum to 1, so a fully wet or fully dry effect never changes the
overall level. Bypass is expressed as mix = 0 rather than a different signal
path, which lets the chain toggle it without rewiring anything.

Equal-power pan
---------------

    θ = (pan + 1) · π/4        pan ∈ [−1, 1]
    L = cos θ,  R = sin θ

At centre both channels sit at √½ (−3 dB) so a sound swept across the field
keeps the same perceived loudness.

Smoothing
---------

Every parameter the control thread can change while audio runs (volume, pan,
wet amount, removal fade) goes through a `SmoothedValue`: a linear ramp to
the new target over a fixed number of samples. Jumps in gain are clicks.
*/

#[inline]
pub fn blend_dry_wet(dry: f32, wet: f32, mix: f32) -> f32 {
    dry * (1.0 - mix) + wet * mix
}

/// Equal-power gains for `pan` in [-1, 1] (left, right).
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
    (theta.cos(), theta.sin())
}

/// Add `src · gain` into `dst`.
#[inline]
pub fn accumulate(dst: &mut [f32], src: &[f32], gain: f32) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += s * gain;
    }
}

/// A parameter ramping linearly toward its target.
#[derive(Debug, Clone, Copy)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl SmoothedValue {
    pub fn new(value: f32, ramp_samples: u32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
            ramp_samples: ramp_samples.max(1),
        }
    }

    /// Ramp length of `seconds` at `sample_rate`.
    pub fn with_time(value: f32, seconds: f32, sample_rate: f32) -> Self {
        Self::new(value, (seconds * sample_rate).round() as u32)
    }

    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        self.remaining = self.ramp_samples;
        self.step = (target - self.current) / self.ramp_samples as f32;
    }

    /// Jump without a ramp.
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }
}
