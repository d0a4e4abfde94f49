#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::effect::Effect;
use super::ids::{EffectId, NodeId};
use super::patch::SoundPatch;
use crate::error::{Error, Result};
use crate::sequencing::{Key, NoteSequence};
use crate::MAX_EFFECTS;

/// One musical layer of a tree. Parent and children are held by the
/// [`NodeTree`](super::NodeTree) arena, not by the node.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub sequence: NoteSequence,
    pub patch: SoundPatch,
    #[cfg_attr(feature = "serde", serde(default))]
    pub effects: Vec<Effect>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub key: Option<Key>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            sequence: NoteSequence::default(),
            patch: SoundPatch::default(),
            effects: Vec::new(),
            key: None,
        }
    }

    pub fn with_sequence(mut self, sequence: NoteSequence) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_patch(mut self, patch: SoundPatch) -> Self {
        self.patch = patch;
        self
    }

    pub fn length_beats(&self) -> f64 {
        self.sequence.length_beats()
    }

    /// Append to the chain. A full chain is left untouched.
    pub fn append_effect(&mut self, effect: Effect) -> Result<()> {
        if self.effects.len() >= MAX_EFFECTS {
            return Err(Error::EffectChainFull { max: MAX_EFFECTS });
        }
        self.effects.push(effect);
        Ok(())
    }

    pub fn remove_effect(&mut self, id: EffectId) -> Result<Effect> {
        let index = self.effect_index(id)?;
        Ok(self.effects.remove(index))
    }

    /// Move an effect to `to` (clamped to the chain length).
    pub fn move_effect(&mut self, id: EffectId, to: usize) -> Result<()> {
        let from = self.effect_index(id)?;
        let effect = self.effects.remove(from);
        let to = to.min(self.effects.len());
        self.effects.insert(to, effect);
        Ok(())
    }

    pub fn effect_mut(&mut self, id: EffectId) -> Result<&mut Effect> {
        let index = self.effect_index(id)?;
        Ok(&mut self.effects[index])
    }

    fn effect_index(&self, id: EffectId) -> Result<usize> {
        self.effects
            .iter()
            .position(|e| e.id == id)
            .ok_or(Error::UnknownEffect(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::effect::EffectKind;

    #[test]
    fn test_full_chain_rejects_append() {
        let mut node = Node::new("lead");
        for _ in 0..MAX_EFFECTS {
            node.append_effect(Effect::new(EffectKind::Gain)).unwrap();
        }
        let before = node.effects.clone();
        let result = node.append_effect(Effect::new(EffectKind::Reverb));
        assert!(matches!(result, Err(Error::EffectChainFull { .. })));
        assert_eq!(node.effects, before);
    }

    #[test]
    fn test_move_effect_reorders() {
        let mut node = Node::new("lead");
        let a = Effect::new(EffectKind::Filter);
        let b = Effect::new(EffectKind::Delay);
        let (a_id, b_id) = (a.id, b.id);
        node.append_effect(a).unwrap();
        node.append_effect(b).unwrap();

        node.move_effect(b_id, 0).unwrap();
        assert_eq!(node.effects[0].id, b_id);
        assert_eq!(node.effects[1].id, a_id);
    }
}
