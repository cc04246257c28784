use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::shared::NUM_STEPS;

const COLS: usize = 4;
const ROWS: usize = 4;

pub const PAD_LABELS: [&str; NUM_STEPS] = [
    "1", "2", "3", "4",
    "Q", "W", "E", "R",
    "A", "S", "D", "F",
    "Z", "X", "C", "V",
];

// 4x4 cells laid out like the keyboard grid; `cursor` gets its own colour
pub fn draw_pad_grid(frame: &mut Frame, area: Rect, lit: &[bool; NUM_STEPS], cursor: Option<usize>) {
    let row_constraints = [Constraint::Percentage(25); ROWS];
    let col_constraints = [Constraint::Percentage(25); COLS];

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints)
            .split(*row_area);

        for (col_idx, cell_area) in cols.iter().enumerate() {
            let idx = row_idx * COLS + col_idx;
            let style = match (lit[idx], cursor == Some(idx)) {
                (_, true) => Style::default().fg(Color::Black).bg(Color::Yellow),
                (true, false) => Style::default().fg(Color::LightMagenta).bg(Color::Magenta),
                (false, false) => Style::default().fg(Color::DarkGray),
            };
            let cell = Paragraph::new(PAD_LABELS[idx])
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).border_style(style))
                .style(style);
            frame.render_widget(cell, *cell_area);
        }
    }
}
