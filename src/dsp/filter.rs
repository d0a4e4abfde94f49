use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
| type              | passes          | rejects      |
| ----------------- | --------------- | ------------ |
| low-pass          | below cutoff    | above cutoff |
| high-pass         | above cutoff    | below cutoff |
| band-pass         | around cutoff   | elsewhere    |
| notch / band-stop | elsewhere       | at cutoff    |

Topology-preserving-transform state variable filter (Zavalishin / Simper).
One pass yields all four responses; `filter_type` only picks the tap.

  g = tan(π · fc / fs)      prewarped integrator gain
  k = 2 − 2 · resonance     damping, resonance in [0, 1)

Coefficients are recomputed only when cutoff, resonance or the sample rate
change, so modulated cutoffs cost one `tan` per block rather than per sample.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

pub struct SVFilter {
    ic1eq: f32,
    ic2eq: f32,
    cutoff_hz: f32,
    resonance: f32,
    filter_type: FilterType,

    g: f32,
    k: f32,
    coeff_rate: f32,
}

impl SVFilter {
    pub fn new(filter_type: FilterType, cutoff_hz: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            resonance: 0.0,
            filter_type,
            g: 0.0,
            k: 2.0,
            coeff_rate: 0.0,
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::LowPass, cutoff_hz)
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::HighPass, cutoff_hz)
    }

    pub fn bandpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::BandPass, cutoff_hz)
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        if cutoff_hz != self.cutoff_hz {
            self.cutoff_hz = cutoff_hz;
            self.coeff_rate = 0.0;
        }
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        let resonance = resonance.clamp(0.0, 0.98);
        if resonance != self.resonance {
            self.resonance = resonance;
            self.coeff_rate = 0.0;
        }
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    #[inline]
    fn update_coefficients(&mut self, sample_rate: f32) {
        if self.coeff_rate == sample_rate {
            return;
        }
        let nyquist_guard = sample_rate * 0.49;
        let fc = self.cutoff_hz.clamp(10.0, nyquist_guard);
        self.g = (PI * fc / sample_rate).tan();
        self.k = 2.0 - 2.0 * self.resonance;
        self.coeff_rate = sample_rate;
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, sample: f32, sample_rate: f32) -> f32 {
        self.update_coefficients(sample_rate);
        let (g, k) = (self.g, self.k);

        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        match self.filter_type {
            FilterType::LowPass => v2,
            FilterType::BandPass => v1,
            FilterType::HighPass => sample - k * v1 - v2,
            FilterType::Notch => sample - k * v1,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], sample_rate: f32) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample, sample_rate);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}
