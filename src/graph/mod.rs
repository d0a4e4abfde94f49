//! Render-side audio graph.
//!
//! A node subgraph is instrument → effect chain → strip, summed onto the
//! master bus. Everything here is built on the control thread and owned by
//! the renderer afterwards; nothing allocates once it is running.

/// Effect chains and their control-side diff.
pub mod chain;
/// Effect settings and the mono effect units.
pub mod effect;
/// The stereo master bus and Shore limiter.
pub mod master;
/// Volume, pan and the removal fade of a node.
pub mod strip;
/// One node's complete render path.
pub mod subgraph;

pub use chain::{ChainMirror, ChainPlan, EffectChain, EffectSlot};
pub use effect::{EffectSettings, EffectUnit};
pub use master::MasterBus;
pub use strip::NodeStrip;
pub use subgraph::NodeSubgraph;
