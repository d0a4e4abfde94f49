//! Starting points for new nodes.
//!
//! A preset is a complete [`Node`]: sound patch, effect chain and a short
//! default pattern. Use them when branching a tree, or study them to see how
//! the different timbres are put together.
//!
//! # Example
//!
//! ```ignore
//! use arbor::voices::{NodePreset, NodeTemplate};
//!
//! let bass = session.add_child_node(root, NodeTemplate::Preset(NodePreset::Bass))?;
//! let echo = session.add_child_node(bass, NodeTemplate::Inherit)?;
//! ```

mod bass;
mod drums;
mod lead;
mod pad;
mod pluck;

pub use bass::bass;
pub use drums::drums;
pub use lead::lead;
pub use pad::pad;
pub use pluck::pluck;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::tree::Node;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePreset {
    Lead,
    Bass,
    Pad,
    Pluck,
    Drums,
}

impl NodePreset {
    pub const ALL: [NodePreset; 5] = [
        NodePreset::Lead,
        NodePreset::Bass,
        NodePreset::Pad,
        NodePreset::Pluck,
        NodePreset::Drums,
    ];

    /// A fresh node with its own id.
    pub fn build(self) -> Node {
        match self {
            NodePreset::Lead => lead(),
            NodePreset::Bass => bass(),
            NodePreset::Pad => pad(),
            NodePreset::Pluck => pluck(),
            NodePreset::Drums => drums(),
        }
    }
}

/// How a new child node gets its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTemplate {
    Preset(NodePreset),
    /// Copy the parent's patch, effects and scale override. The child
    /// starts with an empty loop of the parent's length.
    Inherit,
}

impl NodeTemplate {
    pub(crate) fn instantiate(self, parent: &Node) -> Node {
        match self {
            NodeTemplate::Preset(preset) => preset.build(),
            NodeTemplate::Inherit => {
                let mut node = Node::new(format!("{} branch", parent.name));
                node.patch = parent.patch.clone();
                node.effects = parent
                    .effects
                    .iter()
                    .map(|e| {
                        let mut e = e.clone();
                        e.id = crate::tree::EffectId::new();
                        e
                    })
                    .collect();
                node.key = parent.key;
                node.sequence.set_length_beats(parent.length_beats());
                node
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::STEP_BEATS;
    use crate::tree::{Effect, EffectKind, SoundType};

    #[test]
    fn test_presets_are_playable() {
        for preset in NodePreset::ALL {
            let node = preset.build();
            assert!(!node.sequence.is_empty(), "{preset:?} has no notes");
            assert!(node.effects.len() <= crate::MAX_EFFECTS);
            let steps = node.length_beats() / STEP_BEATS;
            assert_eq!(steps.fract(), 0.0);
        }
    }

    #[test]
    fn test_drums_use_the_kit() {
        assert!(matches!(drums().patch.sound, SoundType::DrumKit { .. }));
    }

    #[test]
    fn test_inherit_copies_sound_not_identity() {
        let mut parent = bass();
        parent.append_effect(Effect::new(EffectKind::Reverb)).unwrap();
        let child = NodeTemplate::Inherit.instantiate(&parent);

        assert_ne!(child.id, parent.id);
        assert_eq!(child.patch, parent.patch);
        assert_eq!(child.effects.len(), parent.effects.len());
        for (a, b) in child.effects.iter().zip(&parent.effects) {
            assert_ne!(a.id, b.id);
            assert_eq!(a.kind, b.kind);
        }
        assert!(child.sequence.is_empty());
        assert_eq!(child.length_beats(), parent.length_beats());
    }
}
