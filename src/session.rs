//! Control-context facade: one project, one engine handle.
//!
//! Every edit goes to the [`Project`] first and is then pushed to the engine
//! with the smallest matching command. Only the first tree plays; edits to
//! the other trees stay in the document. An edit that cannot reach the engine
//! is refused before the project is touched.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::engine::{EngineConfig, EngineHandle, EngineRenderer};
use crate::error::{Error, Result};
use crate::modulation::{LfoDefinition, LfoId, ModulationRouter, ModulationRouting};
use crate::sequencing::capture::quantize_phrase;
use crate::sequencing::{ArpConfig, CaptureBuffer, CycleCache, Euclid, Key};
use crate::tree::{clamp_bpm, Effect, EffectId, Node, NodeId, NodeTree, Project};
use crate::voices::NodeTemplate;
use crate::MAX_EFFECTS;

/// Index of the tree the engine plays.
const PLAYING_TREE: usize = 0;

pub struct Session {
    project: Project,
    engine: EngineHandle,
    cycle: CycleCache,
    capture: CaptureBuffer,
    clock: CaptureClock,
}

impl Session {
    /// A session on a fresh project. The renderer goes to the audio callback.
    pub fn new(config: EngineConfig) -> (Self, EngineRenderer) {
        let (mut session, renderer) = Self::empty(config);
        if let Err(err) = session.load_project(Project::default()) {
            warn!(%err, "default project did not build");
        }
        (session, renderer)
    }

    pub fn with_project(project: Project, config: EngineConfig) -> Result<(Self, EngineRenderer)> {
        let (mut session, renderer) = Self::empty(config);
        session.load_project(project)?;
        Ok((session, renderer))
    }

    fn empty(config: EngineConfig) -> (Self, EngineRenderer) {
        let (engine, renderer) = EngineHandle::new(config);
        let bpm = Project::default().bpm;
        let session = Self {
            project: Project::default(),
            engine,
            cycle: CycleCache::new(),
            capture: CaptureBuffer::default(),
            clock: CaptureClock::new(bpm),
        };
        (session, renderer)
    }

    /// Replace the project and rebuild the whole graph. Playback stops.
    ///
    /// Nodes that do not fit in the graph are left out and the error is
    /// returned; the project is loaded regardless.
    pub fn load_project(&mut self, mut project: Project) -> Result<()> {
        if project.trees.is_empty() {
            warn!("project has no tree, adding an empty root");
            project.trees.push(NodeTree::new(Node::new("Root")));
        }
        info!(
            name = %project.name,
            nodes = project.node_count(),
            bpm = project.bpm,
            "loading project"
        );
        self.project = project;
        self.project.bpm = clamp_bpm(self.project.bpm);
        self.cycle.invalidate();
        self.capture.clear();
        self.engine.reset_transport(self.project.bpm);
        self.clock.set_bpm(self.project.bpm);
        let built = self.engine.sync_mut().build_graph(&self.project);
        self.recompile_modulation();
        built
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EngineHandle {
        &mut self.engine
    }

    pub fn root_id(&self) -> NodeId {
        self.project.tree().root_id()
    }

    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        self.project.find_node(id)
    }

    /// Branch a new node under `parent`. When the parent plays, the node
    /// joins the graph right away; if the graph is full the tree is left
    /// unchanged.
    pub fn add_child_node(&mut self, parent: NodeId, template: NodeTemplate) -> Result<NodeId> {
        let tree = self.project.tree_of(parent).ok_or(Error::UnknownNode(parent))?;
        let node = {
            let parent_node = self.project.trees[tree]
                .get(parent)
                .ok_or(Error::UnknownNode(parent))?;
            template.instantiate(parent_node)
        };
        let id = self.project.trees[tree].add_child(parent, node)?;

        if tree == PLAYING_TREE {
            if let Err(err) = self.sync_new_node(id) {
                warn!(node = %id, %err, "node does not fit in the graph, rolled back");
                self.project.trees[tree].remove(id)?;
                return Err(err);
            }
            self.recompile_modulation();
        }
        info!(node = %id, parent = %parent, ?template, "node added");
        Ok(id)
    }

    fn sync_new_node(&mut self, id: NodeId) -> Result<()> {
        let key = self.project.resolve_key(id).unwrap_or(self.project.key);
        let node = self.project.tree().get(id).ok_or(Error::UnknownNode(id))?;
        self.engine.sync_mut().add_node(node, key)?;
        Ok(())
    }

    /// Remove a node and its whole subtree. The root is refused.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let tree = self.project.tree_of(id).ok_or(Error::UnknownNode(id))?;
        let removed = self.project.trees[tree].remove(id)?;
        if tree == PLAYING_TREE {
            for node in &removed {
                if let Err(err) = self.engine.sync_mut().remove_node(node.id) {
                    warn!(node = %node.id, %err, "removed node had no subgraph");
                }
            }
            self.recompile_modulation();
        }
        info!(node = %id, removed = removed.len(), "subtree removed");
        Ok(())
    }

    /// Edit a node in place. Whatever changed (sequence, scale, patch or
    /// effects) is pushed to its subgraph. A playing-tree node that was left
    /// out of the graph is refused unedited.
    pub fn update_node<R>(&mut self, id: NodeId, edit: impl FnOnce(&mut Node) -> R) -> Result<R> {
        let tree = self.project.tree_of(id).ok_or(Error::UnknownNode(id))?;
        if tree == PLAYING_TREE && !self.engine.sync().contains(id) {
            return Err(Error::UnknownNode(id));
        }
        let before = self.project.trees[tree]
            .get(id)
            .cloned()
            .ok_or(Error::UnknownNode(id))?;
        let result = self.project.trees[tree].update(id, edit)?;
        if tree == PLAYING_TREE {
            self.push_node_changes(&before)?;
        }
        Ok(result)
    }

    fn push_node_changes(&mut self, before: &Node) -> Result<()> {
        let id = before.id;
        let key = self.project.resolve_key(id).unwrap_or(self.project.key);
        let Some(after) = self.project.tree().get(id) else {
            return Err(Error::UnknownNode(id));
        };
        let sync = self.engine.sync_mut();

        if after.sequence != before.sequence || after.key != before.key {
            if after.sequence.arp != before.sequence.arp {
                sync.set_arp(id, &after.sequence, key)?;
            } else {
                sync.load_sequence(id, &after.sequence, key)?;
            }
        }
        if after.patch != before.patch {
            sync.configure_patch(id, &after.patch)?;
        }
        if after.effects != before.effects {
            sync.configure_node_fx_chain(id, &after.effects)?;
        }
        Ok(())
    }

    pub fn rename_node(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update_node(id, |node| node.name = name)
    }

    /// Set a node's loop length. Returns the length actually stored.
    pub fn set_length_beats(&mut self, id: NodeId, beats: f64) -> Result<f64> {
        self.update_node(id, |node| node.sequence.set_length_beats(beats))
    }

    /// Least common multiple of every loop length, cached until the tree's
    /// timing changes.
    pub fn cycle_length_in_beats(&mut self) -> f64 {
        let project = &self.project;
        self.cycle
            .get_or_compute(project.timing_revision(), || project.cycle_length_beats())
    }

    /// Project-wide scale. Every playing node without its own override is
    /// re-quantized.
    pub fn set_key(&mut self, key: Key) {
        self.project.key = key;
        self.reload_sequences();
    }

    pub fn set_tree_key(&mut self, key: Option<Key>) {
        self.project.tree_mut().key = key;
        self.reload_sequences();
    }

    /// Recompile every playing sequence. Nodes left out of the graph are
    /// skipped.
    fn reload_sequences(&mut self) {
        let tree = self.project.tree();
        let sync = self.engine.sync_mut();
        for node in tree.nodes() {
            if !sync.contains(node.id) {
                continue;
            }
            let key = self.project.resolve_key(node.id).unwrap_or(self.project.key);
            if let Err(err) = sync.load_sequence(node.id, &node.sequence, key) {
                warn!(node = %node.id, %err, "sequence not reloaded");
            }
        }
    }

    // --- effects ---

    pub fn append_effect(&mut self, node: NodeId, effect: Effect) -> Result<EffectId> {
        let id = effect.id;
        self.update_node(node, |n| n.append_effect(effect))??;
        Ok(id)
    }

    pub fn remove_effect(&mut self, node: NodeId, effect: EffectId) -> Result<Effect> {
        self.update_node(node, |n| n.remove_effect(effect))?
    }

    pub fn move_effect(&mut self, node: NodeId, effect: EffectId, to: usize) -> Result<()> {
        self.update_node(node, |n| n.move_effect(effect, to))?
    }

    /// Bypass keeps the unit in place and ramps its wet signal to zero.
    pub fn set_effect_bypass(&mut self, node: NodeId, effect: EffectId, bypass: bool) -> Result<()> {
        self.update_node(node, |n| n.effect_mut(effect).map(|e| e.bypass = bypass))?
    }

    pub fn set_effect_param(
        &mut self,
        node: NodeId,
        effect: EffectId,
        name: &str,
        value: f32,
    ) -> Result<()> {
        self.update_node(node, |n| {
            n.effect_mut(effect).map(|e| {
                e.params.insert(name.to_owned(), value);
            })
        })?
    }

    // --- master ---

    pub fn append_master_effect(&mut self, effect: Effect) -> Result<EffectId> {
        let effects = &mut self.project.master.effects;
        if effects.len() >= MAX_EFFECTS {
            return Err(Error::EffectChainFull { max: MAX_EFFECTS });
        }
        let id = effect.id;
        effects.push(effect);
        self.push_master_chain();
        Ok(id)
    }

    pub fn remove_master_effect(&mut self, effect: EffectId) -> Result<Effect> {
        let effects = &mut self.project.master.effects;
        let index = effects
            .iter()
            .position(|e| e.id == effect)
            .ok_or(Error::UnknownEffect(effect))?;
        let removed = effects.remove(index);
        self.push_master_chain();
        Ok(removed)
    }

    pub fn set_master_effect_bypass(&mut self, effect: EffectId, bypass: bool) -> Result<()> {
        self.project
            .master
            .effects
            .iter_mut()
            .find(|e| e.id == effect)
            .ok_or(Error::UnknownEffect(effect))?
            .bypass = bypass;
        self.push_master_chain();
        Ok(())
    }

    fn push_master_chain(&mut self) {
        let effects = &self.project.master.effects;
        self.engine.sync_mut().configure_master_fx_chain(effects);
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.5);
        self.project.master.volume = volume;
        self.engine.sync_mut().configure_master_volume(volume);
    }

    /// Shore is the final limiter on the master bus.
    pub fn set_shore(&mut self, enabled: bool, ceiling: f32) {
        let shore = &mut self.project.master.shore;
        shore.enabled = enabled;
        shore.ceiling = ceiling.clamp(0.01, 1.0);
        let (enabled, ceiling) = (shore.enabled, shore.ceiling);
        self.engine.sync_mut().configure_shore(enabled, ceiling);
    }

    // --- transport ---

    pub fn start(&mut self) {
        self.engine.start();
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.engine.transport().is_playing()
    }

    /// Returns the tempo actually set.
    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        let bpm = self.engine.set_bpm(bpm);
        self.project.bpm = bpm;
        self.clock.set_bpm(bpm);
        bpm
    }

    /// Loop position of a playing node in beats, as of the last rendered
    /// block.
    pub fn playhead(&self, id: NodeId) -> Option<f64> {
        let slot = self.engine.sync().slot_of(id)?;
        self.engine.telemetry().position(slot)
    }

    // --- modulation ---

    pub fn add_lfo(&mut self, lfo: LfoDefinition) -> LfoId {
        let id = lfo.id;
        self.project.lfos.push(lfo);
        self.recompile_modulation();
        id
    }

    pub fn update_lfo(&mut self, id: LfoId, edit: impl FnOnce(&mut LfoDefinition)) -> Result<()> {
        let lfo = self
            .project
            .lfos
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(Error::UnknownLfo(id))?;
        edit(lfo);
        lfo.id = id;
        self.recompile_modulation();
        Ok(())
    }

    /// Remove an LFO together with every routing that uses it.
    pub fn remove_lfo(&mut self, id: LfoId) -> Result<LfoDefinition> {
        let removed = self.project.remove_lfo(id)?;
        self.recompile_modulation();
        Ok(removed)
    }

    pub fn add_routing(&mut self, routing: ModulationRouting) -> Result<()> {
        if self.project.lfo(routing.lfo).is_none() {
            return Err(Error::UnknownLfo(routing.lfo));
        }
        if self.project.find_node(routing.node).is_none() {
            return Err(Error::UnknownNode(routing.node));
        }
        self.project.routings.push(routing);
        self.recompile_modulation();
        Ok(())
    }

    /// Remove every routing matching `lfo`, `node` and `parameter`.
    /// Returns how many were removed.
    pub fn remove_routing(
        &mut self,
        lfo: LfoId,
        node: NodeId,
        parameter: crate::modulation::NodeParameter,
    ) -> usize {
        let before = self.project.routings.len();
        self.project
            .routings
            .retain(|r| !(r.lfo == lfo && r.node == node && r.parameter == parameter));
        let removed = before - self.project.routings.len();
        if removed > 0 {
            self.recompile_modulation();
        }
        removed
    }

    fn recompile_modulation(&mut self) {
        let sync = self.engine.sync();
        let plan = ModulationRouter::compile(&self.project.lfos, &self.project.routings, |id| {
            sync.slot_of(id)
        });
        debug!(
            lfos = self.project.lfos.len(),
            routings = self.project.routings.len(),
            "modulation recompiled"
        );
        self.engine.sync_mut().set_modulation(plan);
    }

    // --- generation ---

    /// Turn the arpeggiator on or off for a node.
    pub fn set_arp(&mut self, id: NodeId, arp: Option<ArpConfig>) -> Result<()> {
        self.update_node(id, |node| node.sequence.arp = arp)
    }

    /// Replace a node's notes with a Euclidean rhythm and size its loop to
    /// the pattern.
    pub fn apply_euclid(&mut self, id: NodeId, euclid: Euclid, pitch: u8, velocity: f32) -> Result<()> {
        self.update_node(id, |node| {
            node.sequence.euclid = Some(euclid);
            node.sequence.apply_euclid(pitch, velocity);
        })
    }

    // --- live play and capture ---

    pub fn note_on(&mut self, id: NodeId, pitch: u8, velocity: f32) -> Result<()> {
        let beat = self.clock.beats();
        self.note_on_at(id, pitch, velocity, beat)
    }

    pub fn note_off(&mut self, id: NodeId, pitch: u8) -> Result<()> {
        let beat = self.clock.beats();
        self.note_off_at(id, pitch, beat)
    }

    /// Play a note and record it at `beat` on the capture clock.
    pub fn note_on_at(&mut self, id: NodeId, pitch: u8, velocity: f32, beat: f64) -> Result<()> {
        self.engine.sync_mut().note_on(id, pitch, velocity)?;
        self.capture.note_on(pitch, velocity, beat);
        Ok(())
    }

    pub fn note_off_at(&mut self, id: NodeId, pitch: u8, beat: f64) -> Result<()> {
        self.engine.sync_mut().note_off(id, pitch)?;
        self.capture.note_off(pitch, beat);
        Ok(())
    }

    /// Write the most recent played phrase into `target`'s sequence,
    /// quantized to steps and padded to whole bars. Returns false when
    /// nothing was captured.
    pub fn capture_performance(&mut self, target: NodeId) -> Result<bool> {
        if self.project.find_node(target).is_none() {
            return Err(Error::UnknownNode(target));
        }
        let phrase = self.capture.take_phrase();
        if phrase.is_empty() {
            return Ok(false);
        }
        let (events, length) = quantize_phrase(&phrase);
        info!(node = %target, notes = events.len(), length, "performance captured");
        self.update_node(target, |node| {
            node.sequence.replace_events(events);
            node.sequence.set_length_beats(length);
        })?;
        Ok(true)
    }

    pub fn clear_capture(&mut self) {
        self.capture.clear();
    }

    pub fn captured_notes(&self) -> usize {
        self.capture.len()
    }

    /// Drop objects the renderer handed back. Call regularly, e.g. once per
    /// UI frame.
    /// Returns how many were collected.
    pub fn collect_retired(&mut self) -> usize {
        let sync = self.engine.sync_mut();
        let collected = sync.collect_retired();
        sync.flush();
        collected
    }
}

/// Beats since the session was created. Each tempo change closes a segment,
/// so notes already captured keep their beat positions.
struct CaptureClock {
    since: Instant,
    beats_before: f64,
    bpm: f32,
}

impl CaptureClock {
    fn new(bpm: f32) -> Self {
        Self {
            since: Instant::now(),
            beats_before: 0.0,
            bpm,
        }
    }

    fn beats(&self) -> f64 {
        self.beats_at(Instant::now())
    }

    fn beats_at(&self, now: Instant) -> f64 {
        let seconds = now.saturating_duration_since(self.since).as_secs_f64();
        self.beats_before + seconds * self.bpm as f64 / 60.0
    }

    fn set_bpm(&mut self, bpm: f32) {
        self.set_bpm_at(bpm, Instant::now());
    }

    fn set_bpm_at(&mut self, bpm: f32, now: Instant) {
        if bpm == self.bpm {
            return;
        }
        self.beats_before = self.beats_at(now);
        self.since = now;
        self.bpm = bpm;
    }
}

#[cfg(feature = "serde")]
impl Session {
    pub fn to_json(&self) -> Result<String> {
        self.project.to_json()
    }

    /// Decode and load a project document. A document that fails to decode
    /// leaves the current project playing.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let project = Project::from_json(json)?;
        self.load_project(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::NodeParameter;
    use crate::sequencing::{NoteEvent, NoteSequence};
    use crate::tree::EffectKind;
    use crate::voices::NodePreset;

    const SR: f32 = 48_000.0;

    fn session() -> (Session, EngineRenderer) {
        Session::new(EngineConfig::with_sample_rate(SR))
    }

    fn run(renderer: &mut EngineRenderer, frames: usize) {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        renderer.render(&mut left, &mut right);
    }

    #[test]
    fn test_add_child_node_joins_the_graph() {
        let (mut session, mut renderer) = session();
        let root = session.root_id();
        let bass = session
            .add_child_node(root, NodeTemplate::Preset(NodePreset::Bass))
            .unwrap();
        run(&mut renderer, 64);

        assert!(session.engine().sync().contains(bass));
        assert_eq!(renderer.occupied_slots(), 2);
        assert_eq!(session.project().tree().parent(bass), Some(root));
    }

    #[test]
    fn test_remove_root_is_refused() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        assert!(matches!(session.remove_node(root), Err(Error::RootRemoval)));
        assert!(session.find_node(root).is_some());
    }

    #[test]
    fn test_remove_subtree_detaches_all_subgraphs() {
        let (mut session, mut renderer) = session();
        let root = session.root_id();
        let a = session.add_child_node(root, NodeTemplate::Preset(NodePreset::Lead)).unwrap();
        let b = session.add_child_node(a, NodeTemplate::Inherit).unwrap();
        run(&mut renderer, 64);

        session.remove_node(a).unwrap();
        assert!(session.find_node(b).is_none());
        assert!(!session.engine().sync().contains(b));
        run(&mut renderer, 480);
        assert_eq!(renderer.occupied_slots(), 1);
    }

    #[test]
    fn test_cycle_length_cache_follows_timing_changes() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        session.set_length_beats(root, 4.0).unwrap();
        let pluck = session
            .add_child_node(root, NodeTemplate::Preset(NodePreset::Pluck))
            .unwrap();
        assert_eq!(session.cycle_length_in_beats(), 12.0);

        session.rename_node(pluck, "renamed").unwrap();
        assert_eq!(session.cycle_length_in_beats(), 12.0);

        session.set_length_beats(pluck, 6.0).unwrap();
        assert_eq!(session.cycle_length_in_beats(), 12.0);
        session.set_length_beats(pluck, 5.0).unwrap();
        assert_eq!(session.cycle_length_in_beats(), 20.0);
    }

    #[test]
    fn test_full_effect_chain_is_left_unchanged() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        for _ in 0..MAX_EFFECTS {
            session.append_effect(root, Effect::new(EffectKind::Gain)).unwrap();
        }
        let serials = session.engine().sync().chain_serials(root);
        let result = session.append_effect(root, Effect::new(EffectKind::Reverb));
        assert!(matches!(result, Err(Error::EffectChainFull { .. })));
        assert_eq!(session.find_node(root).unwrap().effects.len(), MAX_EFFECTS);
        assert_eq!(session.engine().sync().chain_serials(root), serials);
    }

    #[test]
    fn test_bypass_keeps_the_unit() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        let fx = session.append_effect(root, Effect::new(EffectKind::Delay)).unwrap();
        let before = session.engine().sync().chain_serials(root).unwrap();

        session.set_effect_bypass(root, fx, true).unwrap();
        assert_eq!(session.engine().sync().chain_serials(root).unwrap(), before);
        assert!(session.find_node(root).unwrap().effects[0].bypass);
    }

    #[test]
    fn test_capture_writes_quantized_phrase() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        session.note_on_at(root, 60, 0.8, 10.02).unwrap();
        session.note_off_at(root, 60, 10.5).unwrap();
        session.note_on_at(root, 64, 0.8, 11.0).unwrap();
        session.note_off_at(root, 64, 11.2).unwrap();

        assert!(session.capture_performance(root).unwrap());
        let node = session.find_node(root).unwrap();
        let events = node.sequence.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start_beats, 0.0);
        assert_eq!(events[1].start_beats, 1.0);
        assert_eq!(node.length_beats(), 4.0);

        assert!(!session.capture_performance(root).unwrap());
    }

    #[test]
    fn test_clear_capture_discards_phrase() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        session.note_on_at(root, 60, 0.8, 0.0).unwrap();
        session.note_off_at(root, 60, 1.0).unwrap();
        session.clear_capture();
        assert!(!session.capture_performance(root).unwrap());
    }

    #[test]
    fn test_removing_lfo_removes_routings() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        let lfo = session.add_lfo(LfoDefinition::new(2.0));
        session
            .add_routing(ModulationRouting::new(lfo, root, NodeParameter::Pan, 0.5))
            .unwrap();
        session.remove_lfo(lfo).unwrap();
        assert!(session.project().routings.is_empty());
    }

    #[test]
    fn test_routing_to_unknown_targets_is_refused() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        let ghost_lfo = LfoId::new();
        let result = session.add_routing(ModulationRouting::new(
            ghost_lfo,
            root,
            NodeParameter::Volume,
            1.0,
        ));
        assert!(matches!(result, Err(Error::UnknownLfo(_))));
    }

    #[test]
    fn test_bpm_is_clamped_and_stored() {
        let (mut session, _renderer) = session();
        assert_eq!(session.set_bpm(1_000.0), 300.0);
        assert_eq!(session.project().bpm, 300.0);
        assert_eq!(session.set_bpm(5.0), 20.0);
    }

    #[test]
    fn test_euclid_sizes_the_loop() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        session
            .apply_euclid(root, Euclid::new(3, 8, 0), 36, 1.0)
            .unwrap();
        let node = session.find_node(root).unwrap();
        assert_eq!(node.length_beats(), 2.0);
        assert_eq!(node.sequence.events().len(), 3);
    }

    #[test]
    fn test_playhead_reports_position() {
        let (mut session, mut renderer) = session();
        let root = session.root_id();
        session
            .update_node(root, |n| {
                n.sequence = NoteSequence::new(4.0).with_events([NoteEvent::at_step(0, 60, 1.0)])
            })
            .unwrap();
        session.start();
        run(&mut renderer, 24_000);
        let pos = session.playhead(root).unwrap();
        assert!((pos - 1.0).abs() < 1e-6);
    }

    fn crowded_session() -> (Session, EngineRenderer, NodeId, NodeId) {
        let config = EngineConfig {
            max_nodes: 1,
            ..EngineConfig::with_sample_rate(SR)
        };
        let (mut session, renderer) = Session::new(config);
        let mut project = Project::new("crowded");
        let root = project.tree().root_id();
        let child = project
            .tree_mut()
            .add_child(root, Node::new("child").with_sequence(NoteSequence::new(2.0)))
            .unwrap();
        assert!(matches!(
            session.load_project(project),
            Err(Error::GraphFull { max: 1 })
        ));
        (session, renderer, root, child)
    }

    #[test]
    fn test_edit_of_node_left_out_of_graph_is_refused_unchanged() {
        let (mut session, _renderer, root, child) = crowded_session();
        let left_out = if session.engine().sync().contains(root) { child } else { root };
        let before = session.find_node(left_out).unwrap().length_beats();

        let result = session.set_length_beats(left_out, 3.0);
        assert!(matches!(result, Err(Error::UnknownNode(id)) if id == left_out));
        assert_eq!(session.find_node(left_out).unwrap().length_beats(), before);
    }

    #[test]
    fn test_key_change_skips_nodes_left_out_of_graph() {
        let (mut session, mut renderer, _root, _child) = crowded_session();
        run(&mut renderer, 64);
        session.collect_retired();

        session.set_key(Key::new(2, crate::sequencing::ScaleKind::Minor));
        run(&mut renderer, 64);
        // only the one live node got a new program back
        assert_eq!(session.collect_retired(), 1);
    }

    #[test]
    fn test_project_without_trees_gets_a_root() {
        let (mut session, mut renderer) = session();
        let mut project = Project::new("bare");
        project.trees.clear();

        session.load_project(project).unwrap();
        assert_eq!(session.project().trees.len(), 1);
        run(&mut renderer, 64);
        assert_eq!(renderer.occupied_slots(), 1);
    }

    #[test]
    fn test_adding_a_node_reinstalls_modulation() {
        let (mut session, mut renderer) = session();
        let root = session.root_id();
        let lfo = session.add_lfo(LfoDefinition::new(1.0));
        session
            .add_routing(ModulationRouting::new(lfo, root, NodeParameter::Volume, 0.5))
            .unwrap();
        run(&mut renderer, 64);
        session.collect_retired();

        session
            .add_child_node(root, NodeTemplate::Preset(NodePreset::Pad))
            .unwrap();
        run(&mut renderer, 64);
        // the replaced plan comes back
        assert_eq!(session.collect_retired(), 1);
        let routes = renderer.modulation().routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(Some(routes[0].slot), session.engine().sync().slot_of(root));
    }

    #[test]
    fn test_capture_clock_keeps_beats_across_tempo_change() {
        let mut clock = CaptureClock::new(120.0);
        let t0 = clock.since;
        let two = std::time::Duration::from_secs(2);

        assert_eq!(clock.beats_at(t0 + two), 4.0);
        clock.set_bpm_at(60.0, t0 + two);
        assert_eq!(clock.beats_at(t0 + two), 4.0);
        assert_eq!(clock.beats_at(t0 + two + two), 6.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_bad_document_keeps_current_project() {
        let (mut session, _renderer) = session();
        let root = session.root_id();
        assert!(session.load_json("{ not json").is_err());
        assert_eq!(session.root_id(), root);
    }
}
