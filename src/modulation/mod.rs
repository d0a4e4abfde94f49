//! Project-wide LFOs and their routings to node parameters.

mod router;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::lfo::LfoWaveform;
pub use crate::tree::ids::LfoId;
use crate::tree::NodeId;

pub use router::{ModulationPlan, ModulationRouter, NodeModulation, PlannedLfo, PlannedRoute};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LfoDefinition {
    pub id: LfoId,
    pub rate_hz: f32,
    /// Start offset in cycles, 0..1.
    #[cfg_attr(feature = "serde", serde(default))]
    pub phase: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub waveform: LfoWaveform,
    pub enabled: bool,
    /// Display colour slot. Opaque to the engine.
    #[cfg_attr(feature = "serde", serde(default))]
    pub color_index: u8,
}

impl LfoDefinition {
    pub fn new(rate_hz: f32) -> Self {
        Self {
            id: LfoId::new(),
            rate_hz,
            phase: 0.0,
            waveform: LfoWaveform::Sine,
            enabled: true,
            color_index: 0,
        }
    }

    pub fn with_waveform(mut self, waveform: LfoWaveform) -> Self {
        self.waveform = waveform;
        self
    }

    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase.rem_euclid(1.0);
        self
    }
}

/// What a routing moves. Units of the added offset:
///
/// | parameter      | offset of `1.0` means         |
/// |----------------|-------------------------------|
/// | `Volume`       | +1.0 linear gain              |
/// | `Pan`          | full swing right              |
/// | `Pitch`        | +12 semitones                 |
/// | `FilterCutoff` | +1 octave on the voice filter |
/// | `EffectMix`    | +1.0 wet on every effect      |
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeParameter {
    Volume,
    Pan,
    Pitch,
    FilterCutoff,
    EffectMix,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationRouting {
    pub lfo: LfoId,
    pub node: NodeId,
    pub parameter: NodeParameter,
    pub depth: f32,
}

impl ModulationRouting {
    pub fn new(lfo: LfoId, node: NodeId, parameter: NodeParameter, depth: f32) -> Self {
        Self {
            lfo,
            node,
            parameter,
            depth,
        }
    }
}
