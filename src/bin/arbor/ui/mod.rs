//! TUI for arbor
//!
//! Owns the session: every key press is a control-thread edit. The audio
//! callback only feeds the oscilloscope ring.

mod nodes;
mod transport;
mod waveform;

use std::time::Duration;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use rtrb::Consumer;
use tracing::warn;

use arbor::{
    sequencing::Euclid,
    tree::{Effect, EffectKind},
    voices::{NodePreset, NodeTemplate},
    NodeId, Session,
};

use nodes::{render_nodes, NodeRow};
use transport::{render_transport, AudioStats, TransportView};
use waveform::render_waveform;

/// Audio visualization buffer size
const VIS_BUFFER_SIZE: usize = 1024;

/// Computer-keyboard piano, one octave from C4.
const PIANO: [(char, u8); 13] = [
    ('a', 60),
    ('w', 61),
    ('s', 62),
    ('e', 63),
    ('d', 64),
    ('f', 65),
    ('t', 66),
    ('g', 67),
    ('y', 68),
    ('h', 69),
    ('u', 70),
    ('j', 71),
    ('k', 72),
];

pub struct UiApp {
    session: Session,
    scope_rx: Consumer<f32>,
    audio_buffer: Vec<f32>,
    sample_rate: f32,
    selected: usize,
    /// Piano note sounding on the selected node, released on the next key.
    held: Option<(NodeId, u8)>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(session: Session, scope_rx: Consumer<f32>, sample_rate: f32) -> Self {
        Self {
            session,
            scope_rx,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            sample_rate,
            selected: 0,
            held: None,
            should_quit: false,
        }
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.session.collect_retired();
            self.poll_audio();

            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        self.session.stop();
        Ok(())
    }

    fn poll_audio(&mut self) {
        while let Ok(sample) = self.scope_rx.pop() {
            self.audio_buffer.push(sample);
        }
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.session.project().tree().nodes().map(|n| n.id).collect()
    }

    fn selected_id(&self) -> Option<NodeId> {
        self.node_ids().get(self.selected).copied()
    }

    fn handle_key(&mut self, key: KeyCode) {
        self.release_held();
        let Some(selected) = self.selected_id() else {
            return;
        };
        let result = match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                Ok(())
            }
            KeyCode::Char(' ') => {
                if self.session.is_playing() {
                    self.session.stop();
                } else {
                    self.session.start();
                }
                Ok(())
            }
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Ok(())
            }
            KeyCode::Down => {
                let count = self.session.project().tree().len();
                self.selected = (self.selected + 1).min(count.saturating_sub(1));
                Ok(())
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let bpm = self.session.project().bpm + 5.0;
                self.session.set_bpm(bpm);
                Ok(())
            }
            KeyCode::Char('-') => {
                let bpm = self.session.project().bpm - 5.0;
                self.session.set_bpm(bpm);
                Ok(())
            }
            KeyCode::Char('1') => self.branch(selected, NodePreset::Lead),
            KeyCode::Char('2') => self.branch(selected, NodePreset::Bass),
            KeyCode::Char('3') => self.branch(selected, NodePreset::Pad),
            KeyCode::Char('4') => self.branch(selected, NodePreset::Pluck),
            KeyCode::Char('5') => self.branch(selected, NodePreset::Drums),
            KeyCode::Char('b') => self
                .session
                .add_child_node(selected, NodeTemplate::Inherit)
                .map(drop),
            KeyCode::Char('x') => self.session.remove_node(selected).map(|()| {
                self.selected = self.selected.saturating_sub(1);
            }),
            KeyCode::Char('r') => self
                .session
                .append_effect(selected, Effect::new(EffectKind::Reverb))
                .map(drop),
            KeyCode::Char('v') => self.toggle_first_bypass(selected),
            KeyCode::Char('l') => {
                let shore = self.session.project().master.shore;
                self.session.set_shore(!shore.enabled, shore.ceiling);
                Ok(())
            }
            KeyCode::Char('z') => self
                .session
                .apply_euclid(selected, Euclid::new(5, 16, 0), 36, 0.9),
            KeyCode::Char('c') => self.session.capture_performance(selected).map(drop),
            KeyCode::Char(c) => match PIANO.iter().find(|(k, _)| *k == c) {
                Some(&(_, pitch)) => self.session.note_on(selected, pitch, 0.9).map(|()| {
                    self.held = Some((selected, pitch));
                }),
                None => Ok(()),
            },
            _ => Ok(()),
        };
        if let Err(err) = result {
            warn!(%err, "edit refused");
        }
    }

    fn branch(&mut self, parent: NodeId, preset: NodePreset) -> arbor::Result<()> {
        self.session
            .add_child_node(parent, NodeTemplate::Preset(preset))
            .map(drop)
    }

    fn toggle_first_bypass(&mut self, id: NodeId) -> arbor::Result<()> {
        let Some(effect) = self
            .session
            .find_node(id)
            .and_then(|n| n.effects.first())
            .map(|e| (e.id, e.bypass))
        else {
            return Ok(());
        };
        self.session.set_effect_bypass(id, effect.0, !effect.1)
    }

    fn release_held(&mut self) {
        if let Some((id, pitch)) = self.held.take() {
            let _ = self.session.note_off(id, pitch);
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(6),    // Node tree
                Constraint::Length(8), // Waveform
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let cycle = self.session.cycle_length_in_beats();
        let telemetry = self.session.engine().telemetry();
        let project = self.session.project();
        let view = TransportView {
            bpm: project.bpm,
            playing: telemetry.is_playing(),
            beats: telemetry.transport_beats(),
            cycle_beats: cycle,
            sample_rate: self.sample_rate,
            master_volume: project.master.volume,
            shore: project.master.shore.enabled,
        };
        render_transport(frame, chunks[0], &view, &AudioStats::from_buffer(&self.audio_buffer));

        let tree = project.tree();
        let rows: Vec<NodeRow> = tree
            .nodes()
            .map(|node| NodeRow {
                name: &node.name,
                depth: depth_of(tree, node.id),
                length_beats: node.length_beats(),
                steps: node.sequence.events().iter().map(|e| e.step()).collect(),
                effects: node.effects.len(),
                playhead: self.session.playhead(node.id),
            })
            .collect();

        let nodes_block = Block::default().title(" Nodes ").borders(Borders::ALL);
        let nodes_inner = nodes_block.inner(chunks[1]);
        frame.render_widget(nodes_block, chunks[1]);
        render_nodes(frame, nodes_inner, &rows, self.selected);

        render_waveform(frame, chunks[2], &self.audio_buffer);

        let help = Paragraph::new(
            " [Q] Quit  [Space] Play/Stop  [↑↓] Select  [1-5] Branch  [B] Inherit  [X] Remove  \
             [R] Reverb  [V] Bypass  [L] Shore  [Z] Euclid  [A-K] Play  [C] Capture  [+/-] BPM",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}

fn depth_of(tree: &arbor::NodeTree, id: NodeId) -> usize {
    let mut depth = 0;
    let mut current = id;
    while let Some(parent) = tree.parent(current) {
        depth += 1;
        current = parent;
    }
    depth
}
