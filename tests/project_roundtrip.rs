//! Project documents survive an encode/decode cycle.
#![cfg(feature = "serde")]

use arbor::modulation::{LfoDefinition, ModulationRouting, NodeParameter};
use arbor::sequencing::{Accumulator, Direction, Key, NoteEvent, NoteSequence, ScaleKind};
use arbor::tree::{Effect, EffectKind};
use arbor::{Node, NodeTree, Project};

fn three_level_project() -> Project {
    let mut root = Node::new("root");
    root.append_effect(
        Effect::new(EffectKind::Filter)
            .with_param("cutoff", 1_200.0)
            .with_mix(0.7),
    )
    .unwrap();
    root.append_effect(Effect::new(EffectKind::Delay).with_param("beats", 0.75))
        .unwrap();
    let mut tree = NodeTree::new(root);
    let root = tree.root_id();

    let mut mid = Node::new("mid").with_sequence(
        NoteSequence::new(3.0).with_events([
            NoteEvent::new(60, 0.9, 0.0, 1.0),
            NoteEvent::new(64, 0.5, 1.5, 0.5).with_probability(0.5),
        ]),
    );
    mid.sequence.direction = Direction::PingPong;
    mid.sequence.accumulator = Some(Accumulator { step: 2, limit: 4 });
    mid.key = Some(Key::new(9, ScaleKind::Minor));
    let mid = tree.add_child(root, mid).unwrap();

    let leaf = tree
        .add_child(
            mid,
            Node::new("leaf").with_sequence(
                NoteSequence::new(1.25).with_events([NoteEvent::at_step(2, 72, 1.0).with_ratchet(3)]),
            ),
        )
        .unwrap();
    tree.add_child(root, Node::new("sibling")).unwrap();

    let mut project = Project::with_tree("roundtrip", tree);
    project.bpm = 97.0;
    let lfo = LfoDefinition::new(0.5).with_phase(0.25);
    project
        .routings
        .push(ModulationRouting::new(lfo.id, leaf, NodeParameter::FilterCutoff, 0.8));
    project
        .routings
        .push(ModulationRouting::new(lfo.id, mid, NodeParameter::Pan, 0.3));
    project.lfos.push(lfo);
    project
}

#[test]
fn roundtrip_keeps_structure_sequences_and_routings() {
    let project = three_level_project();
    let json = project.to_json().unwrap();
    let decoded = Project::from_json(&json).unwrap();

    assert_eq!(decoded.node_count(), project.node_count());
    let (a, b) = (project.tree(), decoded.tree());
    assert_eq!(a.root_id(), b.root_id());
    for node in a.nodes() {
        let other = b.get(node.id).expect("node survives");
        assert_eq!(b.parent(node.id), a.parent(node.id));
        assert_eq!(b.children(node.id), a.children(node.id));
        assert_eq!(other.sequence, node.sequence);
        assert_eq!(other.effects, node.effects);
        assert_eq!(other.key, node.key);
    }

    assert_eq!(decoded.lfos, project.lfos);
    assert_eq!(decoded.routings, project.routings);
    assert_eq!(decoded.bpm, 97.0);
    assert_eq!(decoded.cycle_length_beats(), project.cycle_length_beats());
}

#[test]
fn decoding_clamps_degenerate_lengths_and_tempo() {
    let mut project = three_level_project();
    project.bpm = 120.0;
    let json = project
        .to_json()
        .unwrap()
        .replace("\"length_beats\": 3.0", "\"length_beats\": -2.0")
        .replace("\"bpm\": 120.0", "\"bpm\": 9000.0");
    let decoded = Project::from_json(&json).unwrap();

    assert_eq!(decoded.bpm, 300.0);
    assert!(decoded
        .nodes()
        .all(|n| n.length_beats() >= arbor::sequencing::STEP_BEATS));
}
