//! Transport bar widget - shows BPM, play state, position, and audio stats

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub struct TransportView {
    pub bpm: f32,
    pub playing: bool,
    pub beats: f64,
    pub cycle_beats: f64,
    pub sample_rate: f32,
    pub master_volume: f32,
    pub shore: bool,
}

/// Audio statistics for display
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

pub fn render_transport(frame: &mut Frame, area: Rect, view: &TransportView, audio: &AudioStats) {
    let block = Block::default().title(" arbor ").borders(Borders::ALL);

    let bar = (view.beats / 4.0).floor() as u64 + 1;
    let beat = (view.beats % 4.0).floor() as u64 + 1;
    let in_cycle = if view.cycle_beats > 0.0 {
        view.beats % view.cycle_beats
    } else {
        0.0
    };

    let (symbol, state) = if view.playing {
        ("▶", "Playing")
    } else {
        ("■", "Stopped")
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" BPM: {:.0}  ", view.bpm),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("{symbol} {state}  "),
            Style::default().fg(if view.playing {
                Color::Green
            } else {
                Color::Yellow
            }),
        ),
        Span::styled(
            format!("Bar {bar} | Beat {beat}  "),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Cycle {:.2}/{:.2}  ", in_cycle, view.cycle_beats),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{:.1}kHz  ", view.sample_rate / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(
                "Vol {:.2}  Shore {}  ",
                view.master_volume,
                if view.shore { "on" } else { "off" }
            ),
            Style::default().fg(Color::Blue),
        ),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}", audio.peak, audio.rms),
            Style::default().fg(Color::Magenta),
        ),
    ]);

    frame.render_widget(Paragraph::new(line).block(block), area);
}
