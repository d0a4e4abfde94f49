use crate::dsp::mix::{equal_power_pan, SmoothedValue};

/// Removal fade length.
pub const FADE_SECONDS: f32 = 0.005;
const PARAM_RAMP_SECONDS: f32 = 0.02;

/// The mixer end of a node subgraph: volume, pan and the removal fade,
/// summed onto the stereo bus.
pub struct NodeStrip {
    volume: SmoothedValue,
    pan: SmoothedValue,
    fade: SmoothedValue,
}

impl NodeStrip {
    pub fn new(volume: f32, pan: f32, sample_rate: f32) -> Self {
        Self {
            volume: SmoothedValue::with_time(volume, PARAM_RAMP_SECONDS, sample_rate),
            pan: SmoothedValue::with_time(pan, PARAM_RAMP_SECONDS, sample_rate),
            fade: SmoothedValue::with_time(1.0, FADE_SECONDS, sample_rate),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume.set_target(volume);
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan.set_target(pan);
    }

    /// Start the removal fade.
    pub fn fade_out(&mut self) {
        self.fade.set_target(0.0);
    }

    pub fn is_fading(&self) -> bool {
        self.fade.target() == 0.0
    }

    /// Fully faded: safe to detach.
    pub fn is_silent(&self) -> bool {
        self.is_fading() && self.fade.is_settled()
    }

    /// Sum `mono` into the bus. Modulation offsets are added on top of the
    /// smoothed values.
    #[inline]
    pub fn mix_into(
        &mut self,
        mono: &[f32],
        left: &mut [f32],
        right: &mut [f32],
        volume_offset: f32,
        pan_offset: f32,
    ) {
        for ((&sample, l), r) in mono.iter().zip(left.iter_mut()).zip(right.iter_mut()) {
            let gain = (self.volume.next() + volume_offset).max(0.0) * self.fade.next();
            let (pan_l, pan_r) = equal_power_pan(self.pan.next() + pan_offset);
            *l += sample * gain * pan_l;
            *r += sample * gain * pan_r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_reaches_silence_in_five_ms() {
        let mut strip = NodeStrip::new(1.0, 0.0, 48_000.0);
        strip.fade_out();
        let mono = [1.0; 240];
        let (mut l, mut r) = ([0.0; 240], [0.0; 240]);
        strip.mix_into(&mono, &mut l, &mut r, 0.0, 0.0);

        assert!(strip.is_silent());
        assert!(l[0] > 0.0);
        assert_eq!(l[239], 0.0);
        // monotonic ramp, no jump
        assert!(l.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_hard_pan_left() {
        let mut strip = NodeStrip::new(1.0, -1.0, 48_000.0);
        let mono = [1.0; 8];
        let (mut l, mut r) = ([0.0; 8], [0.0; 8]);
        strip.mix_into(&mono, &mut l, &mut r, 0.0, 0.0);
        assert!((l[7] - 1.0).abs() < 1e-5);
        assert!(r[7].abs() < 1e-5);
    }
}
