//! Low-frequency waveforms for modulation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
An LFO is an oscillator at control rate (~0.01 to ~20 Hz). Its output moves a
parameter instead of being heard.

    0.01 - 0.5 Hz   slow sweeps, evolving textures
    0.5 - 2 Hz      tremolo, auto-pan
    2 - 7 Hz        vibrato
    > 15 Hz         approaching audio rate (AM/FM territory)

All shapes here are bipolar (-1..+1) functions of a phase in [0, 1). The
modulation router multiplies the value by a routing depth and adds it to the
target parameter. LFOs run on wall-clock time, not on the transport tempo.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoWaveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
}

/// Sample a waveform at `phase` (wrapped into [0, 1)).
#[inline]
pub fn sample(waveform: LfoWaveform, phase: f32) -> f32 {
    let phase = phase.rem_euclid(1.0);
    match waveform {
        LfoWaveform::Sine => (phase * std::f32::consts::TAU).sin(),
        // starts at 0 and rises, like the sine
        LfoWaveform::Triangle => {
            if phase < 0.25 {
                4.0 * phase
            } else if phase < 0.75 {
                2.0 - 4.0 * phase
            } else {
                4.0 * phase - 4.0
            }
        }
        LfoWaveform::Saw => 2.0 * phase - 1.0,
        LfoWaveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Convert bipolar signal (-1.0 to +1.0) to unipolar (0.0 to 1.0).
#[inline]
pub fn bipolar_to_unipolar(bipolar: f32) -> f32 {
    (bipolar + 1.0) * 0.5
}

/// Phase after `seconds` at `rate_hz`, wrapped into [0, 1).
#[inline]
pub fn advance_phase(phase: f32, rate_hz: f32, seconds: f32) -> f32 {
    (phase + rate_hz * seconds).rem_euclid(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_at_quarter_points() {
        assert!(sample(LfoWaveform::Sine, 0.25) > 0.999);
        assert!((sample(LfoWaveform::Triangle, 0.25) - 1.0).abs() < 1e-6);
        assert!((sample(LfoWaveform::Triangle, 0.75) + 1.0).abs() < 1e-6);
        assert!((sample(LfoWaveform::Saw, 0.0) + 1.0).abs() < 1e-6);
        assert_eq!(sample(LfoWaveform::Square, 0.6), -1.0);
    }

    #[test]
    fn test_phase_wraps() {
        let phase = advance_phase(0.9, 2.0, 0.1);
        assert!((phase - 0.1).abs() < 1e-5);
        assert!((sample(LfoWaveform::Saw, 1.25) - sample(LfoWaveform::Saw, 0.25)).abs() < 1e-6);
    }

    #[test]
    fn test_bipolar_to_unipolar() {
        assert!((bipolar_to_unipolar(-1.0)).abs() < 1e-6);
        assert!((bipolar_to_unipolar(1.0) - 1.0).abs() < 1e-6);
    }
}
