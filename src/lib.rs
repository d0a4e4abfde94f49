pub mod dsp;
pub mod error;
pub mod graph; // Render-side effect units, chains and the master bus
pub mod modulation;
pub mod sequencing; // Steps, sequences, scales, cycle length, per-node sequencer
pub mod synth; // Voice units and polyphony
pub mod tree; // Node arena, patches, effects, project document
pub mod voices;

#[cfg(feature = "rtrb")]
pub mod engine; // Command queue, renderer, graph synchronizer, transport
#[cfg(feature = "rtrb")]
pub mod session;

pub use error::{Error, Result};
#[cfg(feature = "rtrb")]
pub use engine::{EngineConfig, EngineHandle, EngineRenderer};
#[cfg(feature = "rtrb")]
pub use session::Session;
pub use tree::{Node, NodeId, NodeTree, Project};

pub const MAX_BLOCK_SIZE: usize = 2048;
/// Effect slots per chain (node or master).
pub const MAX_EFFECTS: usize = 8;
/// Live node subgraphs the renderer can hold.
pub const MAX_NODES: usize = 128;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
