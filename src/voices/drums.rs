//! Drum kit voice.
//!
//! One node drives a whole kit: each pad answers to its own note, General
//! MIDI style (kick 36, snare 38, clap 39, closed hat 42, tom 45).
//!
//! The default bar is a plain backbeat: kick on 1 and 3, snare on 2 and 4,
//! hats on every eighth with the off-beats softer.

use crate::sequencing::{NoteEvent, NoteSequence};
use crate::tree::{Adsr, DrumVoice, Effect, EffectKind, Node, SoundPatch, SoundType};

const KICK: u8 = 36;
const SNARE: u8 = 38;
const HAT: u8 = 42;

pub fn drums() -> Node {
    let mut sequence = NoteSequence::new(4.0);
    for step in (0..16).step_by(2) {
        let velocity = if step % 4 == 0 { 0.7 } else { 0.45 };
        sequence.insert(NoteEvent::at_step(step, HAT, velocity));
    }
    for step in [0, 8] {
        sequence.insert(NoteEvent::at_step(step, KICK, 1.0));
    }
    for step in [4, 12] {
        sequence.insert(NoteEvent::at_step(step, SNARE, 0.9));
    }

    Node {
        effects: vec![Effect::new(EffectKind::Compressor)
            .with_param("threshold", -12.0)
            .with_param("ratio", 3.0)],
        ..Node::new("Drums")
            .with_sequence(sequence)
            .with_patch(SoundPatch {
                sound: SoundType::DrumKit {
                    voices: DrumVoice::standard_kit(),
                },
                envelope: Adsr::new(0.001, 0.1, 0.0, 0.05),
                volume: 0.9,
                pan: 0.0,
            })
    }
}
