//! Whole-engine scenarios.
//!
//! These drive the public session API the way the host does: build a tree
//! from presets, start the transport and render blocks.

mod hot_patch;
mod render;

pub use hot_patch::bench_hot_patch;
pub use render::bench_render;

use arbor::voices::{NodePreset, NodeTemplate};
use arbor::{EngineConfig, EngineRenderer, Session};

use crate::SAMPLE_RATE;

/// A playing session with `branches` preset nodes under the root.
pub fn playing_session(branches: usize) -> (Session, EngineRenderer) {
    let (mut session, renderer) = Session::new(EngineConfig::with_sample_rate(SAMPLE_RATE));
    let root = session.root_id();
    for preset in NodePreset::ALL.iter().cycle().take(branches) {
        session
            .add_child_node(root, NodeTemplate::Preset(*preset))
            .expect("preset fits in the graph");
    }
    session.start();
    (session, renderer)
}
