//! Pad voice - slow, sustained chords.
//!
//! Triangle pair with a wide detune, long attack and release, washed in
//! reverb. Sits behind everything else.

use crate::dsp::oscillator::OscillatorWaveform;
use crate::sequencing::{NoteEvent, NoteSequence};
use crate::tree::{Adsr, Effect, EffectKind, Node, SoundPatch, SoundType};

/// Two whole-bar chords, Cmaj7 then Am7.
pub fn pad() -> Node {
    let chords: [(f64, [u8; 4]); 2] = [(0.0, [60, 64, 67, 71]), (4.0, [57, 60, 64, 67])];
    let sequence = NoteSequence::new(8.0).with_events(chords.iter().flat_map(|(start, notes)| {
        notes
            .iter()
            .map(move |&pitch| NoteEvent::new(pitch, 0.5, *start, 3.75))
    }));

    Node {
        effects: vec![Effect::new(EffectKind::Reverb)
            .with_param("room_size", 0.85)
            .with_mix(0.45)],
        ..Node::new("Pad")
            .with_sequence(sequence)
            .with_patch(SoundPatch {
                sound: SoundType::Oscillator {
                    waveform: OscillatorWaveform::Triangle,
                    detune_cents: 14.0,
                },
                envelope: Adsr::new(0.6, 0.5, 0.8, 1.2),
                volume: 0.5,
                pan: 0.0,
            })
    }
}
