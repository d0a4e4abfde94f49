#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Phase-Accumulator Oscillator
============================

Every waveform here is a function of a normalised phase in [0, 1). Each sample
the phase advances by `frequency / sample_rate` and wraps at 1.0.

  Sine      sin(2π·phase)
  Saw       2·phase − 1, with a PolyBLEP correction at the wrap
  Square    ±1 split at phase 0.5, PolyBLEP at both edges
  Triangle  integrated square, computed directly from phase
  Noise     uniform white noise from a seeded generator (no phase)

PolyBLEP (polynomial band-limited step) subtracts a small polynomial residual
around each discontinuity. It is not perfect band-limiting, but it removes the
worst aliasing for the cost of a couple of multiplies.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscillatorWaveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Noise,
}

pub struct OscillatorBlock {
    waveform: OscillatorWaveform,
    phase: f32,
    rng: fastrand::Rng,
}

impl OscillatorBlock {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
            rng: fastrand::Rng::with_seed(0x5eed_a4b0),
        }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn sawtooth() -> Self {
        Self::new(OscillatorWaveform::Saw)
    }

    pub fn square() -> Self {
        Self::new(OscillatorWaveform::Square)
    }

    pub fn triangle() -> Self {
        Self::new(OscillatorWaveform::Triangle)
    }

    pub fn noise() -> Self {
        Self::new(OscillatorWaveform::Noise)
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }

    /// Produce one sample and advance the phase.
    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let dt = (frequency / sample_rate).clamp(0.0, 0.5);
        let phase = self.phase;

        let value = match self.waveform {
            OscillatorWaveform::Sine => (phase * std::f32::consts::TAU).sin(),
            OscillatorWaveform::Saw => 2.0 * phase - 1.0 - poly_blep(phase, dt),
            OscillatorWaveform::Square => {
                let naive = if phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(phase, dt) - poly_blep((phase + 0.5).fract(), dt)
            }
            OscillatorWaveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            OscillatorWaveform::Noise => self.rng.f32() * 2.0 - 1.0,
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        value
    }

    /// Overwrite `out` with the oscillator at a fixed frequency.
    pub fn render(&mut self, out: &mut [f32], frequency: f32, sample_rate: f32) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(frequency, sample_rate);
        }
    }

    /// Restart the cycle so a retriggered note has a consistent attack.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

impl Default for OscillatorBlock {
    fn default() -> Self {
        Self::sine()
    }
}

#[inline]
fn poly_blep(phase: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    if phase < dt {
        let t = phase / dt;
        t + t - t * t - 1.0
    } else if phase > 1.0 - dt {
        let t = (phase - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}
