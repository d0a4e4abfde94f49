//! Benchmarks for single render-side units.

mod effects;
mod sequencer;

pub use effects::bench_effects;
pub use sequencer::bench_sequencer;
