//! Graph edits while the transport runs.

use arbor::modulation::{LfoDefinition, ModulationRouter, ModulationRouting, NodeParameter};
use arbor::tree::{Effect, EffectKind};
use arbor::voices::{NodePreset, NodeTemplate};
use arbor::{EngineConfig, EngineRenderer, Session};

const SR: f32 = 48_000.0;

fn render(renderer: &mut EngineRenderer, frames: usize) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; frames];
    let mut right = vec![0.0; frames];
    renderer.render(&mut left, &mut right);
    (left, right)
}

fn playing() -> (Session, EngineRenderer) {
    let (mut session, renderer) = Session::new(EngineConfig::with_sample_rate(SR));
    let root = session.root_id();
    for preset in [NodePreset::Bass, NodePreset::Pluck, NodePreset::Drums] {
        session
            .add_child_node(root, NodeTemplate::Preset(preset))
            .unwrap();
    }
    session.start();
    (session, renderer)
}

#[test]
fn same_chain_twice_keeps_unit_instances() {
    let (mut session, mut renderer) = playing();
    let root = session.root_id();
    let effects = vec![
        Effect::new(EffectKind::Filter),
        Effect::new(EffectKind::Smear),
        Effect::new(EffectKind::Reverb),
    ];

    session
        .update_node(root, |n| n.effects = effects.clone())
        .unwrap();
    render(&mut renderer, 512);
    let slot = session.engine().sync().slot_of(root).unwrap();
    let once = renderer.slot(slot).unwrap().chain().serials();

    session
        .update_node(root, |n| n.effects = effects.clone())
        .unwrap();
    render(&mut renderer, 512);
    assert_eq!(renderer.slot(slot).unwrap().chain().serials(), once);
}

#[test]
fn reorder_and_edit_keep_instances_and_add_only_new() {
    let (mut session, mut renderer) = playing();
    let root = session.root_id();
    let filter = session
        .append_effect(root, Effect::new(EffectKind::Filter))
        .unwrap();
    let delay = session
        .append_effect(root, Effect::new(EffectKind::Delay))
        .unwrap();
    render(&mut renderer, 256);
    let slot = session.engine().sync().slot_of(root).unwrap();
    let before = renderer.slot(slot).unwrap().chain().serials();

    session.move_effect(root, delay, 0).unwrap();
    session
        .set_effect_param(root, filter, "cutoff", 500.0)
        .unwrap();
    session
        .append_effect(root, Effect::new(EffectKind::Gain))
        .unwrap();
    render(&mut renderer, 256);

    let after = renderer.slot(slot).unwrap().chain().serials();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[1]);
    assert_eq!(after[1], before[0]);
    assert!(!before.contains(&after[2]));
}

#[test]
fn removal_while_playing_stays_finite_and_frees_the_slot() {
    let (mut session, mut renderer) = playing();
    let root = session.root_id();
    render(&mut renderer, 4_800);

    let doomed = session.project().tree().children(root)[0];
    session.remove_node(doomed).unwrap();
    let (left, right) = render(&mut renderer, 4_800);
    assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() <= 1.0));

    session.collect_retired();
    assert_eq!(session.engine().sync().draining(), 0);
    assert_eq!(renderer.occupied_slots(), 3);
}

#[test]
fn routing_to_removed_node_is_skipped_without_touching_others() {
    let (mut session, _renderer) = playing();
    let root = session.root_id();
    let children = session.project().tree().children(root);
    let (gone, kept) = (children[0], children[1]);

    let lfo = session.add_lfo(LfoDefinition::new(1.0));
    session
        .add_routing(ModulationRouting::new(lfo, gone, NodeParameter::Volume, 0.5))
        .unwrap();
    session
        .add_routing(ModulationRouting::new(lfo, kept, NodeParameter::Pan, 0.5))
        .unwrap();

    session.remove_node(gone).unwrap();
    // the routing stays in the document
    assert_eq!(session.project().routings.len(), 2);

    let sync = session.engine().sync();
    let plan = ModulationRouter::compile(
        &session.project().lfos,
        &session.project().routings,
        |id| sync.slot_of(id),
    );
    assert_eq!(plan.routes().len(), 1);
    let values = plan.values_at(0.25);
    assert!(values.contains_key(&(kept, NodeParameter::Pan)));
    assert!(!values.keys().any(|(node, _)| *node == gone));
}

#[test]
fn master_edits_apply_while_playing() {
    let (mut session, mut renderer) = playing();
    session
        .append_master_effect(Effect::new(EffectKind::Compressor))
        .unwrap();
    session.set_master_volume(0.5);
    session.set_shore(true, 0.5);
    render(&mut renderer, 2_048);

    assert_eq!(renderer.master().chain().len(), 1);
    let (left, right) = render(&mut renderer, 9_600);
    assert!(left.iter().chain(&right).all(|s| s.abs() <= 0.5 + 1e-3));
}
