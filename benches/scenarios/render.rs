//! Full renders of growing trees.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};

use super::playing_session;
use crate::BLOCK_SIZES;

pub fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/render");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        for branches in [1, 5, 20] {
            let (mut session, mut renderer) = playing_session(branches);
            group.bench_with_input(
                BenchmarkId::new(format!("{branches}_branches"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        renderer.render(black_box(&mut left), black_box(&mut right));
                        session.collect_retired();
                    })
                },
            );
        }
    }

    group.finish();
}
