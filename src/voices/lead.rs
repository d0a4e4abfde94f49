//! Lead voice.
//!
//! A bright, cutting lead built on a slightly detuned sawtooth. Saw waves
//! carry every harmonic, so a lead made from one sits on top of a mix.
//!
//! # How It Works
//!
//! 1. Detuned sawtooth pair for width
//! 2. Envelope with some sustain for held notes
//! 3. Low-pass filter in the chain tames the top end
//!
//! # Variations
//!
//! - Route an LFO to filter cutoff for a wah
//! - Shorter decay, no sustain = plucky lead
//! - Add a synced delay = spacey lead

use crate::dsp::oscillator::OscillatorWaveform;
use crate::sequencing::{NoteEvent, NoteSequence};
use crate::tree::{Adsr, Effect, EffectKind, Node, SoundPatch, SoundType};

/// A one-bar melody in C.
pub fn lead() -> Node {
    let sequence = NoteSequence::new(4.0).with_events([
        NoteEvent::new(72, 0.9, 0.0, 0.5),
        NoteEvent::new(74, 0.7, 0.75, 0.25),
        NoteEvent::new(76, 0.8, 1.0, 1.0),
        NoteEvent::new(79, 0.8, 2.5, 0.5),
        NoteEvent::new(76, 0.6, 3.0, 1.0),
    ]);

    Node {
        effects: vec![Effect::new(EffectKind::Filter).with_param("cutoff", 2_500.0)],
        ..Node::new("Lead")
            .with_sequence(sequence)
            .with_patch(SoundPatch {
                sound: SoundType::Oscillator {
                    waveform: OscillatorWaveform::Saw,
                    detune_cents: 8.0,
                },
                envelope: Adsr::new(0.01, 0.1, 0.6, 0.2),
                volume: 0.7,
                pan: 0.0,
            })
    }
}
