//! Sequencer trigger generation, with and without the arpeggiator.

use std::hint::black_box;

use arbor::sequencing::{
    ArpConfig, Key, NoteEvent, NoteSequence, SequenceProgram, Sequencer,
};
use arbor::synth::message::TriggerBuffer;
use criterion::{BenchmarkId, Criterion};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn busy_sequence() -> NoteSequence {
    NoteSequence::new(4.0).with_events((0..16).map(|step| {
        NoteEvent::at_step(step, 48 + (step as u8 * 5) % 24, 0.8)
            .with_probability(0.7)
            .with_ratchet(if step % 4 == 3 { 3 } else { 1 })
    }))
}

pub fn bench_sequencer(c: &mut Criterion) {
    let mut group = c.benchmark_group("units/sequencer");

    for &size in BLOCK_SIZES {
        let mut triggers = TriggerBuffer::new();

        let program = SequenceProgram::compile(&busy_sequence(), Key::default());
        let mut steps = Sequencer::new(Box::new(program), SAMPLE_RATE);
        steps.start(120.0, 0.0);
        group.bench_with_input(BenchmarkId::new("steps", size), &size, |b, &size| {
            b.iter(|| {
                triggers.clear();
                steps.process(black_box(size), &mut triggers);
            })
        });

        let mut arp_sequence = busy_sequence();
        arp_sequence.arp = Some(ArpConfig::default());
        let program = SequenceProgram::compile(&arp_sequence, Key::default());
        let mut arp = Sequencer::new(Box::new(program), SAMPLE_RATE);
        arp.start(120.0, 0.0);
        group.bench_with_input(BenchmarkId::new("arp", size), &size, |b, &size| {
            b.iter(|| {
                triggers.clear();
                arp.process(black_box(size), &mut triggers);
            })
        });
    }

    group.finish();
}
