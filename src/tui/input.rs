use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use super::mode::TuiState;
use crate::shared::{InputEvent, Mode};

// poll for input from the terminal and resolve the key against the current page
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        return Ok(match key.kind {
            KeyEventKind::Press => handle_key(key.code, ts),
            KeyEventKind::Release => handle_release(key.code, ts),
            KeyEventKind::Repeat => vec![],
        });
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc => return vec![InputEvent::Quit],
        KeyCode::Char('m') => return vec![InputEvent::MainMenu],
        _ => {}
    }
    match ts.mode {
        Mode::MainMenu => main_menu_key(code),
        Mode::Sequencer => sequencer_key(code),
        Mode::Granular => granular_key(code, ts),
    }
}

// only the gate cares about releases; lets a real key-up close it
fn handle_release(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Char('b') if ts.mode == Mode::Granular && ts.gate_held => {
            ts.gate_held = false;
            vec![InputEvent::GateClose]
        }
        _ => vec![],
    }
}

fn main_menu_key(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Char('1') => vec![InputEvent::EnterSequencer],
        KeyCode::Char('2') => vec![InputEvent::EnterGranular],
        _ => vec![],
    }
}

fn sequencer_key(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],
        KeyCode::Char('g') => vec![InputEvent::NextTrack],
        KeyCode::Char('h') => vec![InputEvent::NextTrackSample],
        KeyCode::Char('u') => vec![InputEvent::ToggleMute],
        KeyCode::Char('k') => vec![InputEvent::ToggleMetronome],
        KeyCode::Char('0') => vec![InputEvent::ResetSequencer],
        KeyCode::Char('[') => vec![InputEvent::AdjustBpm(-1)],
        KeyCode::Char(']') => vec![InputEvent::AdjustBpm(1)],
        KeyCode::Char('-') => vec![InputEvent::AdjustTrackVolume(-0.05)],
        KeyCode::Char('=') => vec![InputEvent::AdjustTrackVolume(0.05)],
        KeyCode::Char(c) => char_to_pad(c).map_or_else(Vec::new, |n| vec![InputEvent::ToggleStep(n)]),
        _ => vec![],
    }
}

fn granular_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        // lowercase = down, shifted = up
        KeyCode::Char('b') => {
            ts.gate_held = true;
            vec![InputEvent::GateOpen]
        }
        KeyCode::Char('B') => {
            ts.gate_held = false;
            vec![InputEvent::GateClose]
        }
        KeyCode::Char(' ') => vec![InputEvent::StopPad],
        KeyCode::Char('p') => vec![InputEvent::NextGranularParam],
        KeyCode::Char('h') => vec![InputEvent::NextGranularSample],
        KeyCode::Char('[') => vec![InputEvent::AdjustGranularParam(-1)],
        KeyCode::Char(']') => vec![InputEvent::AdjustGranularParam(1)],
        KeyCode::Char('-') => vec![InputEvent::AdjustGranularJitter(-1)],
        KeyCode::Char('=') => vec![InputEvent::AdjustGranularJitter(1)],
        KeyCode::Char(c) => char_to_pad(c).map_or_else(Vec::new, |n| vec![InputEvent::TriggerPad(n)]),
        _ => vec![],
    }
}

// convert char to pad index
pub fn char_to_pad(c: char) -> Option<u8> {
    let idx = match c {
        '1' => 0, '2' => 1, '3' => 2, '4' => 3,
        'q' => 4, 'w' => 5, 'e' => 6, 'r' => 7,
        'a' => 8, 's' => 9, 'd' => 10, 'f' => 11,
        'z' => 12, 'x' => 13, 'c' => 14, 'v' => 15,
        _ => return None,
    };
    Some(idx)
}
