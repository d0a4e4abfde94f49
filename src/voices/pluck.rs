//! Pluck voice - percussive, quickly-decaying note.
//!
//! Plucks are short, punchy sounds for arpeggios and rhythmic figures.
//! Think kalimba, harp, or synth pluck.
//!
//! # How It Works
//!
//! 1. Triangle wave for a soft, bell-like tone
//! 2. Instant attack (1ms) and no sustain
//! 3. Tempo-synced dotted-eighth delay in the chain
//!
//! # Variations
//!
//! - Shorter decay (50-80ms) = more staccato
//! - Sine wave = purer, more mellow

use crate::dsp::oscillator::OscillatorWaveform;
use crate::sequencing::{NoteEvent, NoteSequence};
use crate::tree::{Adsr, Effect, EffectKind, Node, SoundPatch, SoundType};

/// Three-beat figure, so it drifts against four-beat loops.
pub fn pluck() -> Node {
    let sequence = NoteSequence::new(3.0).with_events(
        [67u8, 72, 74, 79, 74, 72]
            .iter()
            .enumerate()
            .map(|(i, &pitch)| NoteEvent::new(pitch, 0.75, i as f64 * 0.5, 0.25)),
    );

    Node {
        effects: vec![Effect::new(EffectKind::Delay)
            .with_param("beats", 0.75)
            .with_param("feedback", 0.35)
            .with_mix(0.3)],
        ..Node::new("Pluck")
            .with_sequence(sequence)
            .with_patch(SoundPatch {
                sound: SoundType::Oscillator {
                    waveform: OscillatorWaveform::Triangle,
                    detune_cents: 0.0,
                },
                envelope: Adsr::new(0.001, 0.15, 0.0, 0.1),
                volume: 0.6,
                pan: 0.25,
            })
    }
}
