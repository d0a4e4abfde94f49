//! One benchmark per effect kind, default parameters.

use std::hint::black_box;

use arbor::graph::{EffectSettings, EffectUnit};
use arbor::tree::{Effect, EffectKind};
use criterion::{BenchmarkId, Criterion};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("units/effects");

    for &size in BLOCK_SIZES {
        // sawtooth-like ramp
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();
        let mut buffer = input.clone();

        for kind in EffectKind::ALL {
            let settings = EffectSettings::from_effect(&Effect::new(kind));
            let mut unit = EffectUnit::new(settings, 0, SAMPLE_RATE);
            unit.set_bpm(120.0);

            group.bench_with_input(
                BenchmarkId::new(format!("{kind:?}").to_lowercase(), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        buffer.copy_from_slice(&input);
                        for sample in buffer.iter_mut() {
                            *sample = unit.process(black_box(*sample));
                        }
                    })
                },
            );
        }
    }

    group.finish();
}
