//! Node list - one row per node with its loop and playhead

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use arbor::sequencing::STEP_BEATS;

pub struct NodeRow<'a> {
    pub name: &'a str,
    pub depth: usize,
    pub length_beats: f64,
    /// Steps that start a note.
    pub steps: Vec<usize>,
    pub effects: usize,
    pub playhead: Option<f64>,
}

const LABEL_WIDTH: usize = 18;

pub fn render_nodes(frame: &mut Frame, area: Rect, rows: &[NodeRow], selected: usize) {
    if area.height < 1 || area.width < LABEL_WIDTH as u16 + 8 {
        return;
    }
    let grid_width = area.width as usize - LABEL_WIDTH - 6;

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .take(area.height as usize)
        .map(|(i, row)| {
            let is_selected = i == selected;
            let label = format!("{}{}", "  ".repeat(row.depth), row.name);
            let label = format!("{:width$.width$}", label, width = LABEL_WIDTH);

            let steps = ((row.length_beats / STEP_BEATS).round() as usize).max(1);
            let shown = steps.min(grid_width);
            let playhead_step = row
                .playhead
                .map(|p| (p / STEP_BEATS).floor() as usize % steps);

            let mut grid = String::with_capacity(shown * 3);
            for step in 0..shown {
                grid.push(if playhead_step == Some(step) {
                    '▲'
                } else if row.steps.contains(&step) {
                    '▓'
                } else {
                    '░'
                });
            }

            let style = if is_selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(vec![
                Span::styled(label, style),
                Span::styled(grid, Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!(" fx{}", row.effects),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}
