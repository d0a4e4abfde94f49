use std::cell::OnceCell;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ids::NodeId;
use super::node::Node;
use crate::error::{Error, Result};
use crate::sequencing::Key;

/*
Arena node tree
===============

Nodes live in a flat `Vec` of slots. Parent/child links are `NodeKey`s
(index + generation) into that vec, so walking up or down the tree never
recurses through owned values, and a `NodeId → NodeKey` map gives O(1)
lookup by identity.

  slot  [0]         [1]          [2]        [3]
        root ───┬── bass         (free)     lead
                └──────────────────────────┘

Removing a node frees its whole subtree. Freed slots bump their generation
before reuse, so a stale key from an earlier occupant never resolves.

Invariants:
  * the root has no parent and can't be removed
  * every other node has exactly one parent that is live
  * a node is never its own ancestor (children are only ever created under
    an existing node, and nodes are never re-parented)

Timing revision
---------------

`revision` moves only when something that affects musical timing changes:
a node added, a subtree removed, or a loop length edited through
`update`. Renames and patch tweaks leave it alone, so the cycle-length cache
keyed on it survives them.

The pre-order flattening used by `nodes()` is cached and dropped on any
structural change.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "TreeDocument", try_from = "TreeDocument"))]
#[derive(Debug, Clone)]
pub struct NodeTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    index: HashMap<NodeId, NodeKey>,
    root: NodeKey,
    /// Tree-level scale override.
    pub key: Option<Key>,
    revision: u64,
    flat: OnceCell<Vec<NodeKey>>,
}

impl NodeTree {
    pub fn new(root: Node) -> Self {
        let root_key = NodeKey {
            index: 0,
            generation: 0,
        };
        let mut index = HashMap::new();
        index.insert(root.id, root_key);
        Self {
            slots: vec![Slot {
                generation: 0,
                entry: Some(Entry {
                    node: root,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
            index,
            root: root_key,
            key: None,
            revision: 0,
            flat: OnceCell::new(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.node_at(self.root).id
    }

    pub fn root(&self) -> &Node {
        self.node_at(self.root)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let key = self.index.get(&id)?;
        self.entry(*key).map(|e| &e.node)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let key = self.index.get(&id)?;
        let parent = self.entry(*key)?.parent?;
        Some(self.node_at(parent).id)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.index
            .get(&id)
            .and_then(|key| self.entry(*key))
            .map(|e| e.children.iter().map(|c| self.node_at(*c).id).collect())
            .unwrap_or_default()
    }

    /// Every node, pre-order from the root.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.flat().iter().map(|key| self.node_at(*key))
    }

    /// Attach `node` under `parent`. A node whose id is already taken gets a
    /// fresh one. Returns the id it was stored under.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId> {
        let parent_key = *self.index.get(&parent).ok_or(Error::UnknownNode(parent))?;
        if self.index.contains_key(&node.id) {
            node.id = NodeId::new();
        }
        let id = node.id;

        let entry = Entry {
            node,
            parent: Some(parent_key),
            children: Vec::new(),
        };
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                NodeKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                NodeKey {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        if let Some(parent_entry) = self.entry_mut(parent_key) {
            parent_entry.children.push(key);
        }
        self.index.insert(id, key);
        self.structure_changed();
        Ok(id)
    }

    /// Remove a node and its whole subtree. Returns the removed nodes in
    /// pre-order. The root is refused.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<Node>> {
        let key = *self.index.get(&id).ok_or(Error::UnknownNode(id))?;
        if key == self.root {
            return Err(Error::RootRemoval);
        }

        if let Some(parent) = self.entry(key).and_then(|e| e.parent) {
            if let Some(parent_entry) = self.entry_mut(parent) {
                parent_entry.children.retain(|c| *c != key);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            let Some(entry) = slot.entry.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            self.index.remove(&entry.node.id);
            stack.extend(entry.children.iter().rev());
            removed.push(entry.node);
        }

        self.structure_changed();
        Ok(removed)
    }

    /// Edit one node in place. The id cannot be changed. A length change
    /// moves the timing revision; nothing else does.
    pub fn update<R>(&mut self, id: NodeId, edit: impl FnOnce(&mut Node) -> R) -> Result<R> {
        let key = *self.index.get(&id).ok_or(Error::UnknownNode(id))?;
        let entry = self.entry_mut(key).ok_or(Error::UnknownNode(id))?;

        let length_before = entry.node.length_beats();
        let result = edit(&mut entry.node);
        entry.node.id = id;
        let length_changed = entry.node.length_beats() != length_before;

        if length_changed {
            self.revision += 1;
        }
        Ok(result)
    }

    /// Ids of `id` and everything below it, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&key) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        self.walk(key, &mut |k| out.push(self.node_at(k).id));
        out
    }

    fn flat(&self) -> &[NodeKey] {
        self.flat.get_or_init(|| {
            let mut keys = Vec::with_capacity(self.index.len());
            self.walk(self.root, &mut |k| keys.push(k));
            keys
        })
    }

    fn walk(&self, from: NodeKey, visit: &mut impl FnMut(NodeKey)) {
        let mut stack = vec![from];
        while let Some(key) = stack.pop() {
            if let Some(entry) = self.entry(key) {
                visit(key);
                stack.extend(entry.children.iter().rev());
            }
        }
    }

    fn structure_changed(&mut self) {
        self.revision += 1;
        self.flat.take();
    }

    fn entry(&self, key: NodeKey) -> Option<&Entry> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, key: NodeKey) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Keys handed out by the tree itself are always live.
    fn node_at(&self, key: NodeKey) -> &Node {
        match self.entry(key) {
            Some(entry) => &entry.node,
            None => unreachable!("stale node key {key:?}"),
        }
    }
}

/// Recursive document form of a tree: each node nests its children.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDocument {
    pub node: Node,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub children: Vec<NodeDocument>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TreeDocument {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub key: Option<Key>,
    pub root: NodeDocument,
}

impl NodeTree {
    pub fn to_document(&self) -> TreeDocument {
        TreeDocument {
            key: self.key,
            root: self.document_at(self.root),
        }
    }

    fn document_at(&self, key: NodeKey) -> NodeDocument {
        let entry = self.entry(key);
        NodeDocument {
            node: self.node_at(key).clone(),
            children: entry
                .map(|e| e.children.iter().map(|c| self.document_at(*c)).collect())
                .unwrap_or_default(),
        }
    }

    /// Rebuild from a document. Duplicate ids are rejected.
    pub fn from_document(doc: TreeDocument) -> std::result::Result<Self, String> {
        let TreeDocument { key, root } = doc;
        let NodeDocument { node, children } = root;
        let mut tree = NodeTree::new(node);
        tree.key = key;

        let mut stack: Vec<(NodeId, NodeDocument)> = Vec::new();
        let root_id = tree.root_id();
        stack.extend(children.into_iter().rev().map(|c| (root_id, c)));

        while let Some((parent, doc)) = stack.pop() {
            let NodeDocument { node, children } = doc;
            let id = node.id;
            if tree.contains(id) {
                return Err(format!("duplicate node id {id}"));
            }
            tree.add_child(parent, node).map_err(|e| e.to_string())?;
            stack.extend(children.into_iter().rev().map(|c| (id, c)));
        }

        tree.revision = 0;
        Ok(tree)
    }
}

impl From<NodeTree> for TreeDocument {
    fn from(tree: NodeTree) -> Self {
        tree.to_document()
    }
}

impl TryFrom<TreeDocument> for NodeTree {
    type Error = String;

    fn try_from(doc: TreeDocument) -> std::result::Result<Self, Self::Error> {
        NodeTree::from_document(doc)
    }
}

impl PartialEq for NodeTree {
    fn eq(&self, other: &Self) -> bool {
        self.to_document() == other.to_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (NodeTree, NodeId, NodeId, NodeId) {
        let mut tree = NodeTree::new(Node::new("root"));
        let root = tree.root_id();
        let a = tree.add_child(root, Node::new("a")).unwrap();
        let b = tree.add_child(a, Node::new("b")).unwrap();
        (tree, root, a, b)
    }

    #[test]
    fn test_parent_child_links() {
        let (tree, root, a, b) = tree();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.children(root), vec![a]);
    }

    #[test]
    fn test_remove_frees_subtree() {
        let (mut tree, root, a, b) = tree();
        let removed = tree.remove(a).unwrap();
        assert_eq!(removed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(b));
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn test_root_and_unknown_removal_refused() {
        let (mut tree, root, _, _) = tree();
        assert!(matches!(tree.remove(root), Err(Error::RootRemoval)));
        assert!(matches!(tree.remove(NodeId::new()), Err(Error::UnknownNode(_))));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_orphan_add_refused() {
        let (mut tree, ..) = tree();
        let revision = tree.revision();
        assert!(tree.add_child(NodeId::new(), Node::new("orphan")).is_err());
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.revision(), revision);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let (mut tree, root, a, b) = tree();
        let stale = tree.index[&b];
        tree.remove(a).unwrap();
        let c = tree.add_child(root, Node::new("c")).unwrap();
        let fresh = tree.index[&c];
        assert_eq!(fresh.index, stale.index);
        assert_eq!(fresh.generation, stale.generation + 1);
        assert!(tree.entry(stale).is_none());
    }

    #[test]
    fn test_revision_ignores_renames() {
        let (mut tree, _, a, _) = tree();
        let revision = tree.revision();
        tree.update(a, |n| n.name = "renamed".into()).unwrap();
        assert_eq!(tree.revision(), revision);

        tree.update(a, |n| {
            n.sequence.set_length_beats(3.0);
        })
        .unwrap();
        assert_eq!(tree.revision(), revision + 1);
    }

    #[test]
    fn test_update_cannot_change_id() {
        let (mut tree, _, a, _) = tree();
        tree.update(a, |n| n.id = NodeId::new()).unwrap();
        assert!(tree.get(a).is_some());
    }

    #[test]
    fn test_pre_order_listing_is_rebuilt_after_changes() {
        let (mut tree, root, a, b) = tree();
        let names: Vec<NodeId> = tree.nodes().map(|n| n.id).collect();
        assert_eq!(names, vec![root, a, b]);

        let c = tree.add_child(root, Node::new("c")).unwrap();
        let names: Vec<NodeId> = tree.nodes().map(|n| n.id).collect();
        assert_eq!(names, vec![root, a, b, c]);
    }

    #[test]
    fn test_document_round_trip_keeps_shape() {
        let (tree, root, a, b) = tree();
        let rebuilt = NodeTree::from_document(tree.to_document()).unwrap();
        assert_eq!(rebuilt.parent(b), Some(a));
        assert_eq!(rebuilt.parent(a), Some(root));
        assert_eq!(rebuilt, tree);
    }
}
