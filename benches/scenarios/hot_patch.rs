//! Cost of a block that applies an effect chain change while playing.

use std::hint::black_box;

use arbor::tree::{Effect, EffectKind};
use criterion::{BenchmarkId, Criterion};

use super::playing_session;
use crate::BLOCK_SIZES;

pub fn bench_hot_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/hot_patch");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        let (mut session, mut renderer) = playing_session(5);
        let root = session.root_id();
        let mut toggle = false;

        group.bench_with_input(BenchmarkId::new("reorder_chain", size), &size, |b, _| {
            b.iter(|| {
                // alternate between two chains so every iteration sends a plan
                toggle = !toggle;
                let effects = if toggle {
                    vec![Effect::new(EffectKind::Filter), Effect::new(EffectKind::Delay)]
                } else {
                    vec![Effect::new(EffectKind::Gain)]
                };
                session
                    .update_node(root, |node| node.effects = effects)
                    .expect("root exists");
                renderer.render(black_box(&mut left), black_box(&mut right));
                session.collect_retired();
            })
        });
    }

    group.finish();
}
