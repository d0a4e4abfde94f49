//! The project document: node trees, patches, effect chains.
//!
//! All of this lives on the control thread. The engine gets its own
//! compiled copies of whatever it needs to render.

pub mod arena;
pub mod effect;
pub mod ids;
pub mod node;
pub mod patch;
pub mod project;

pub use arena::{NodeDocument, NodeKey, NodeTree, TreeDocument};
pub use effect::{Effect, EffectKind};
pub use ids::{EffectId, LfoId, NodeId};
pub use node::Node;
pub use patch::{Adsr, DrumKind, DrumVoice, SoundPatch, SoundType};
pub use project::{clamp_bpm, MasterSettings, Project, Shore, DEFAULT_BPM, MAX_BPM, MIN_BPM};
