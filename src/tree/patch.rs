#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::EnvelopeShape;
use crate::dsp::oscillator::OscillatorWaveform;

/// Amplitude envelope in seconds (sustain is a level).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Adsr {
    pub const fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    pub fn shape(&self) -> EnvelopeShape {
        EnvelopeShape::new(self.attack, self.decay, self.sustain, self.release)
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new(0.01, 0.1, 0.7, 0.3)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumKind {
    Kick,
    Snare,
    HiHat,
    Clap,
    Tom,
}

/// One pad of a drum kit.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumVoice {
    pub kind: DrumKind,
    /// Note that triggers this pad.
    pub note: u8,
    pub tune_hz: f32,
    pub decay: f32,
    pub level: f32,
}

impl DrumVoice {
    pub fn new(kind: DrumKind, note: u8) -> Self {
        let (tune_hz, decay) = match kind {
            DrumKind::Kick => (50.0, 0.35),
            DrumKind::Snare => (190.0, 0.18),
            DrumKind::HiHat => (8_000.0, 0.05),
            DrumKind::Clap => (1_200.0, 0.2),
            DrumKind::Tom => (110.0, 0.3),
        };
        Self {
            kind,
            note,
            tune_hz,
            decay,
            level: 0.8,
        }
    }

    /// General MIDI layout: kick 36, snare 38, clap 39, closed hat 42, tom 45.
    pub fn standard_kit() -> Vec<DrumVoice> {
        vec![
            DrumVoice::new(DrumKind::Kick, 36),
            DrumVoice::new(DrumKind::Snare, 38),
            DrumVoice::new(DrumKind::Clap, 39),
            DrumVoice::new(DrumKind::HiHat, 42),
            DrumVoice::new(DrumKind::Tom, 45),
        ]
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum SoundType {
    Oscillator {
        waveform: OscillatorWaveform,
        detune_cents: f32,
    },
    DrumKit {
        voices: Vec<DrumVoice>,
    },
}

impl Default for SoundType {
    fn default() -> Self {
        SoundType::Oscillator {
            waveform: OscillatorWaveform::Saw,
            detune_cents: 6.0,
        }
    }
}

/// What a node sounds like. Copied by value with the node.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SoundPatch {
    pub sound: SoundType,
    pub envelope: Adsr,
    pub volume: f32,
    pub pan: f32,
}

impl Default for SoundPatch {
    fn default() -> Self {
        Self {
            sound: SoundType::default(),
            envelope: Adsr::default(),
            volume: 0.8,
            pan: 0.0,
        }
    }
}

impl SoundPatch {
    pub fn clamped_volume(&self) -> f32 {
        self.volume.clamp(0.0, 1.5)
    }

    pub fn clamped_pan(&self) -> f32 {
        self.pan.clamp(-1.0, 1.0)
    }
}
