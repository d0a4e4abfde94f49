//! Schroeder reverberator.
//!
//! ```text
//! Input ──┬──→ [Comb 1] ──┐
//!         ├──→ [Comb 2] ──┤
//!         ├──→ [Comb 3] ──┼──→ (+) ──→ [Allpass 1] ──→ [Allpass 2] ──→ Output
//!         └──→ [Comb 4] ──┘
//! ```
//!
//! Combs (`y[n] = x[n] + g·lp(y[n − d])`) build the decaying tail; the
//! allpasses diffuse it. Comb lengths are mutually prime-ish so their echoes
//! do not pile up on one frequency. A one-pole lowpass inside each comb
//! loop models high-frequency absorption ("damping").
//!
//! Buffers are boxed slices sized from the sample rate when the reverb is
//! built on the control thread. The two channels of a stereo instance use a
//! small `spread` offset so left and right decorrelate.

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];

struct CombFilter {
    buffer: Box<[f32]>,
    pos: usize,
    feedback: f32,
    damp: f32,
    lowpass: f32,
}

impl CombFilter {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)].into_boxed_slice(),
            pos: 0,
            feedback: 0.8,
            damp: 0.5,
            lowpass: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.lowpass = output * (1.0 - self.damp) + self.lowpass * self.damp;
        self.buffer[self.pos] = input + self.lowpass * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.lowpass = 0.0;
        self.pos = 0;
    }
}

struct AllpassFilter {
    buffer: Box<[f32]>,
    pos: usize,
    gain: f32,
}

impl AllpassFilter {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)].into_boxed_slice(),
            pos: 0,
            gain: 0.5,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = -self.gain * input + delayed;
        self.buffer[self.pos] = input + self.gain * output;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

pub struct SchroederReverb {
    combs: [CombFilter; 4],
    allpasses: [AllpassFilter; 2],
}

impl SchroederReverb {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_spread(sample_rate, 0)
    }

    /// Build with every delay lengthened by `spread` samples.
    pub fn with_spread(sample_rate: f32, spread: usize) -> Self {
        let samples = |ms: f32| (ms * sample_rate / 1000.0) as usize + spread;
        Self {
            combs: COMB_DELAYS_MS.map(|ms| CombFilter::new(samples(ms))),
            allpasses: ALLPASS_DELAYS_MS.map(|ms| AllpassFilter::new(samples(ms))),
        }
    }

    /// 0.0 = small room, 1.0 = very long tail.
    pub fn set_room_size(&mut self, size: f32) {
        let feedback = 0.7 + size.clamp(0.0, 1.0) * 0.28;
        for comb in &mut self.combs {
            comb.feedback = feedback;
        }
    }

    pub fn set_damping(&mut self, damp: f32) {
        for comb in &mut self.combs {
            comb.damp = damp.clamp(0.0, 1.0);
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input);
        }
        output *= 0.25;

        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }
        output
    }

    pub fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.allpasses.iter_mut().for_each(AllpassFilter::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb_filter_creates_echo() {
        let mut comb = CombFilter::new(10);
        comb.feedback = 0.5;
        comb.damp = 0.0;

        assert!(comb.process(1.0).abs() < 0.01);
        for _ in 0..9 {
            comb.process(0.0);
        }
        assert!(comb.process(0.0).abs() > 0.4, "echo expected after 10 samples");
    }

    #[test]
    fn test_reverb_produces_tail() {
        let mut reverb = SchroederReverb::new(48_000.0);
        reverb.set_room_size(0.5);
        let _ = reverb.process(1.0);

        let has_tail = (0..5000).any(|_| reverb.process(0.0).abs() > 0.001);
        assert!(has_tail, "reverb should ring after an impulse");
    }

    #[test]
    fn test_reverb_stability_at_max_room() {
        let mut reverb = SchroederReverb::with_spread(48_000.0, 23);
        reverb.set_room_size(1.0);
        for _ in 0..10_000 {
            let out = reverb.process(0.1);
            assert!(out.is_finite() && out.abs() < 10.0, "unstable output {out}");
        }
    }
}
