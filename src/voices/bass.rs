//! Bass voice.
//!
//! Square wave bass. The hollow, odd-harmonic tone stays out of the way of
//! saw leads while still reading on small speakers.
//!
//! # How It Works
//!
//! 1. Square oscillator, no detune so the low end stays mono
//! 2. Fast attack, medium decay, moderate sustain
//! 3. Dark low-pass and a touch of saturation in the chain

use crate::dsp::oscillator::OscillatorWaveform;
use crate::sequencing::{NoteEvent, NoteSequence};
use crate::tree::{Adsr, Effect, EffectKind, Node, SoundPatch, SoundType};

/// Root and fifth on the off-beats, two bars.
pub fn bass() -> Node {
    let sequence = NoteSequence::new(8.0).with_events(
        (0..8).map(|beat| {
            let pitch = if beat % 4 == 3 { 43 } else { 36 };
            NoteEvent::new(pitch, 0.85, beat as f64 + 0.5, 0.25)
        }),
    );

    Node {
        effects: vec![
            Effect::new(EffectKind::Filter)
                .with_param("cutoff", 600.0)
                .with_param("resonance", 0.3),
            Effect::new(EffectKind::Distortion)
                .with_param("drive", 2.0)
                .with_mix(0.3),
        ],
        ..Node::new("Bass")
            .with_sequence(sequence)
            .with_patch(SoundPatch {
                sound: SoundType::Oscillator {
                    waveform: OscillatorWaveform::Square,
                    detune_cents: 0.0,
                },
                envelope: Adsr::new(0.005, 0.2, 0.5, 0.1),
                volume: 0.8,
                pan: 0.0,
            })
    }
}
