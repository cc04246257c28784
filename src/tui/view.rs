use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::grid::draw_pad_grid;
use crate::shared::{DisplayState, Mode, NUM_STEPS};

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8), // screen
            Constraint::Min(12),   // pad grid
            Constraint::Length(1), // help line
        ])
        .split(area);

    draw_screen(frame, sections[0], state);
    draw_keypad(frame, sections[1], state, blink_on);
    draw_help(frame, sections[2], state);
}

fn title(state: &DisplayState) -> String {
    let page = match state.mode {
        Mode::MainMenu => "MAIN MENU",
        Mode::Sequencer => "SEQUENCER",
        Mode::Granular => "GRANULAR",
    };
    if state.status.is_empty() {
        format!(" {page} ")
    } else {
        format!(" {page} | {} ", state.status)
    }
}

fn draw_screen(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines = match state.mode {
        Mode::MainMenu => vec![
            Line::from("1  Sequencer"),
            Line::from("2  Granular"),
            Line::from(format!("{} samples loaded", state.sample_count)),
        ],
        Mode::Sequencer => sequencer_lines(state),
        Mode::Granular => granular_lines(state),
    };
    let screen = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title(state)));
    frame.render_widget(screen, area);
}

fn sequencer_lines(state: &DisplayState) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!(
        "BPM {}  {}  STEP {:>2}  CLICK {}",
        state.bpm,
        if state.running { "PLAY" } else { "STOP" },
        state.current_step as usize + 1,
        if state.metronome { "on" } else { "off" },
    ))];
    for (i, track) in state.tracks.iter().enumerate() {
        let selected = i == state.selected_track as usize;
        let marker = if selected { ">" } else { " " };
        let name = track.sample_name.as_deref().unwrap_or("None");
        let steps: String = track
            .steps
            .iter()
            .enumerate()
            .map(|(s, &on)| match (on, s == state.current_step as usize && state.running) {
                (_, true) => '|',
                (true, false) => '#',
                (false, false) => '.',
            })
            .collect();
        let style = if selected {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{marker}T{} {name:<14.14}", i + 1), style),
            Span::raw(format!(" {steps} ")),
            Span::raw(format!(
                "vol {:>3.0}%{} x{}",
                track.volume * 100.0,
                if track.mute { " M" } else { "" },
                track.triggers
            )),
        ]));
    }
    lines
}

fn granular_lines(state: &DisplayState) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!(
        "{}  gate {}",
        state.granular_sample,
        if state.gate_open { "OPEN" } else { "closed" },
    ))];
    let params: Vec<Span> = state
        .params
        .iter()
        .map(|&(param, value, jitter)| {
            let text = format!(" {} {value:.2} ±{jitter:.2} ", param.label());
            if param == state.selected_param {
                Span::styled(text, Style::default().fg(Color::Black).bg(Color::Cyan))
            } else {
                Span::raw(text)
            }
        })
        .collect();
    lines.push(Line::from(params));
    lines.push(Line::from(format!(
        "grains {}/8  spawned {}  dropped {}",
        state.active_grains, state.spawn_successes, state.spawn_failures
    )));
    lines
}

fn draw_keypad(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    match state.mode {
        Mode::MainMenu => {}
        Mode::Sequencer => {
            let track = &state.tracks[state.selected_track as usize % state.tracks.len()];
            let playhead = (state.running && blink_on).then_some(state.current_step as usize);
            draw_pad_grid(frame, area, &track.steps, playhead);
        }
        Mode::Granular => {
            let loaded: [bool; NUM_STEPS] = std::array::from_fn(|i| i < state.sample_count);
            draw_pad_grid(frame, area, &loaded, None);
        }
    }
}

fn draw_help(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let help = match state.mode {
        Mode::MainMenu => "1/2 select  esc quit",
        Mode::Sequencer => "grid steps  spc play  g track  h sample  u mute  k click  0 reset  [ ] bpm  - = vol  m menu",
        Mode::Granular => "b/B gate  p param  h sample  [ ] value  - = jitter  grid preview  spc stop  m menu",
    };
    frame.render_widget(Paragraph::new(help).style(Style::default().fg(Color::DarkGray)), area);
}
