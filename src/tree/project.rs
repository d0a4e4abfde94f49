#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::effect::Effect;
use super::ids::{LfoId, NodeId};
use super::node::Node;
use super::NodeTree;
use crate::error::{Error, Result};
use crate::modulation::{LfoDefinition, ModulationRouting};
use crate::sequencing::{cycle_length_beats, resolve_key, Key, STEP_BEATS};

pub const MIN_BPM: f32 = 20.0;
pub const MAX_BPM: f32 = 300.0;
pub const DEFAULT_BPM: f32 = 120.0;

/// Clamp a tempo into the supported range. Non-finite input falls back to
/// the default tempo.
pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_finite() {
        bpm.clamp(MIN_BPM, MAX_BPM)
    } else {
        DEFAULT_BPM
    }
}

/// The master brick-wall limiter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shore {
    pub enabled: bool,
    /// Linear peak ceiling, 0.01..=1.0.
    pub ceiling: f32,
}

impl Default for Shore {
    fn default() -> Self {
        Self {
            enabled: true,
            ceiling: 0.98,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MasterSettings {
    #[cfg_attr(feature = "serde", serde(default))]
    pub effects: Vec<Effect>,
    pub volume: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub shore: Shore,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            effects: Vec::new(),
            volume: 0.8,
            shore: Shore::default(),
        }
    }
}

/// A whole document: trees, tempo, key, master bus and modulation.
///
/// There is always at least one tree. The first tree is the one that plays.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub bpm: f32,
    pub key: Key,
    pub trees: Vec<NodeTree>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub master: MasterSettings,
    #[cfg_attr(feature = "serde", serde(default))]
    pub lfos: Vec<LfoDefinition>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub routings: Vec<ModulationRouting>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bpm: DEFAULT_BPM,
            key: Key::default(),
            trees: vec![NodeTree::new(Node::new("Root"))],
            master: MasterSettings::default(),
            lfos: Vec::new(),
            routings: Vec::new(),
        }
    }

    pub fn with_tree(name: impl Into<String>, tree: NodeTree) -> Self {
        Self {
            trees: vec![tree],
            ..Self::new(name)
        }
    }

    /// The playing tree.
    pub fn tree(&self) -> &NodeTree {
        &self.trees[0]
    }

    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.trees[0]
    }

    /// Every node of every tree.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.trees.iter().flat_map(|t| t.nodes())
    }

    pub fn node_count(&self) -> usize {
        self.trees.iter().map(NodeTree::len).sum()
    }

    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        self.trees.iter().find_map(|t| t.get(id))
    }

    /// Index of the tree holding `id`.
    pub fn tree_of(&self, id: NodeId) -> Option<usize> {
        self.trees.iter().position(|t| t.contains(id))
    }

    /// The effective scale of a node: node override, then tree, then project.
    pub fn resolve_key(&self, id: NodeId) -> Option<Key> {
        let tree = &self.trees[self.tree_of(id)?];
        let node = tree.get(id)?;
        Some(resolve_key(node.key, tree.key, self.key))
    }

    /// Changes whenever a node is added or removed, a loop length changes, or
    /// trees are added or dropped.
    pub fn timing_revision(&self) -> u64 {
        let revisions = self
            .trees
            .iter()
            .fold(0u64, |acc, t| acc.wrapping_add(t.revision()));
        revisions.wrapping_add((self.trees.len() as u64) << 48)
    }

    /// Uncached cycle length across every node of every tree.
    pub fn cycle_length_beats(&self) -> f64 {
        cycle_length_beats(self.nodes().map(Node::length_beats), STEP_BEATS)
    }

    pub fn lfo(&self, id: LfoId) -> Option<&LfoDefinition> {
        self.lfos.iter().find(|l| l.id == id)
    }

    /// Drop an LFO and every routing that uses it.
    pub fn remove_lfo(&mut self, id: LfoId) -> Result<LfoDefinition> {
        let index = self
            .lfos
            .iter()
            .position(|l| l.id == id)
            .ok_or(Error::UnknownLfo(id))?;
        self.routings.retain(|r| r.lfo != id);
        Ok(self.lfos.remove(index))
    }

    /// Routings whose node no longer exists. They stay in the document and
    /// are skipped when modulation is compiled.
    pub fn dangling_routings(&self) -> impl Iterator<Item = &ModulationRouting> + '_ {
        self.routings
            .iter()
            .filter(|r| self.find_node(r.node).is_none())
    }
}

#[cfg(feature = "serde")]
impl Project {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode a document. Tempo is clamped and an empty tree list gets a
    /// fresh root tree.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut project: Project = serde_json::from_str(json)?;
        project.bpm = clamp_bpm(project.bpm);
        project.master.shore.ceiling = project.master.shore.ceiling.clamp(0.01, 1.0);
        if project.trees.is_empty() {
            project.trees.push(NodeTree::new(Node::new("Root")));
        }
        Ok(project)
    }
}
