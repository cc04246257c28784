// Sits between the terminal and the audio side: turns InputEvents into
// Controls writes and reads everything back into a DisplayState each frame.
use std::sync::Arc;

use tracing::debug;

use crate::audio::Controls;
use crate::shared::*;

pub struct Middle {
    controls: Arc<Controls>,
    mode: Mode,
    selected_track: usize,
    selected_param: GranularParam,
    status: String,
    display: DisplayState,
}

impl Middle {
    pub fn new(controls: Arc<Controls>) -> Self {
        controls.set_mode(Mode::MainMenu);
        Self {
            controls,
            mode: Mode::MainMenu,
            selected_track: 0,
            selected_param: GranularParam::default(),
            status: String::new(),
            display: DisplayState::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn controls(&self) -> &Arc<Controls> {
        &self.controls
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        debug!(?event, mode = ?self.mode, "input");
        match event {
            InputEvent::Quit => {}
            InputEvent::MainMenu => self.set_mode(Mode::MainMenu),
            InputEvent::EnterSequencer => self.set_mode(Mode::Sequencer),
            InputEvent::EnterGranular => self.set_mode(Mode::Granular),
            _ => match self.mode {
                Mode::MainMenu => {}
                Mode::Sequencer => self.handle_sequencer(event),
                Mode::Granular => self.handle_granular(event),
            },
        }
    }

    // Leaving a page stops what it started; entering starts it again.
    fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        let c = &self.controls;
        match self.mode {
            Mode::Sequencer => c.set_running(false),
            Mode::Granular => {
                c.set_gate_open(false);
                c.set_granular_mode(false);
            }
            Mode::MainMenu => {}
        }
        self.status.clear();
        match mode {
            Mode::Sequencer => c.set_running(true),
            Mode::Granular => {
                if !c.set_granular_sample_index(0) {
                    self.status = "no playable sample".into();
                }
                c.set_granular_mode(true);
            }
            Mode::MainMenu => {}
        }
        c.set_mode(mode);
        self.mode = mode;
    }

    fn handle_sequencer(&mut self, event: InputEvent) {
        let c = &self.controls;
        let track = self.selected_track;
        match event {
            InputEvent::PlayPress => c.set_running(!c.is_running()),
            InputEvent::ToggleStep(step) => {
                let step = step as usize;
                c.set_step_active(track, step, !c.is_step_active(track, step));
            }
            InputEvent::NextTrack => self.selected_track = (track + 1) % NUM_TRACKS,
            InputEvent::NextTrackSample => {
                // unassigned, then every sample in turn
                let count = c.store().sample_count();
                let next = match c.track(track).and_then(|t| t.sample()) {
                    None if count > 0 => Some(0),
                    Some(i) if i + 1 < count => Some(i + 1),
                    _ => None,
                };
                c.set_track_sample(track, next);
            }
            InputEvent::ToggleMute => {
                if let Some(t) = c.track(track) {
                    c.set_track_mute(track, !t.is_muted());
                }
            }
            InputEvent::ToggleMetronome => c.set_metronome_enabled(!c.is_metronome_enabled()),
            InputEvent::ResetSequencer => c.reset_sequencer(),
            InputEvent::AdjustBpm(delta) => c.set_bpm(c.bpm() as f32 + delta as f32),
            InputEvent::AdjustTrackVolume(delta) => {
                if let Some(t) = c.track(track) {
                    c.set_track_volume(track, t.volume() + delta);
                }
            }
            _ => {}
        }
    }

    fn handle_granular(&mut self, event: InputEvent) {
        let c = &self.controls;
        match event {
            InputEvent::GateOpen => c.set_gate_open(true),
            InputEvent::GateClose => c.set_gate_open(false),
            InputEvent::NextGranularParam => self.selected_param = self.selected_param.next(),
            InputEvent::NextGranularSample => {
                let count = c.store().sample_count();
                if count > 0 {
                    let next = (c.granular_sample_index() + 1) % count;
                    if !c.set_granular_sample_index(next) {
                        self.status = format!("sample {} is not loaded", next + 1);
                    }
                }
            }
            InputEvent::AdjustGranularParam(delta) => {
                let (step, _) = self.selected_param.knob_steps();
                let delta = delta as f32 * step;
                let s = c.granular_settings();
                match self.selected_param {
                    GranularParam::SpawnRate => c.set_granular_spawn_rate(s.spawn_rate + delta),
                    GranularParam::Duration => c.set_granular_duration(s.duration + delta),
                    GranularParam::Speed => c.set_granular_speed(s.speed + delta),
                    GranularParam::Position => c.set_granular_position(s.position + delta),
                }
            }
            InputEvent::AdjustGranularJitter(delta) => {
                let (_, step) = self.selected_param.knob_steps();
                let delta = delta as f32 * step;
                let j = c.granular_jitter();
                match self.selected_param {
                    GranularParam::SpawnRate => c.set_spawn_rate_jitter(j.spawn_rate + delta),
                    GranularParam::Duration => c.set_duration_jitter(j.duration + delta),
                    GranularParam::Speed => c.set_speed_jitter(j.speed + delta),
                    GranularParam::Position => c.set_position_jitter(j.position + delta),
                }
            }
            InputEvent::TriggerPad(pad) => {
                if !c.trigger_sample(pad as usize) {
                    self.status = format!("no sample on pad {}", pad + 1);
                }
            }
            InputEvent::StopPad => {
                c.stop_all_samples();
            }
            _ => {}
        }
    }

    /// Snapshot for the view, rebuilt from the shared controls.
    pub fn display_state(&mut self) -> &DisplayState {
        let c = &self.controls;
        let store = c.store();
        let d = &mut self.display;

        d.mode = self.mode;
        d.status.clone_from(&self.status);
        d.sample_count = store.sample_count();

        d.bpm = c.bpm();
        d.running = c.is_running();
        d.current_step = c.current_step() as u8;
        d.selected_track = self.selected_track as u8;
        d.metronome = c.is_metronome_enabled();
        for (i, view) in d.tracks.iter_mut().enumerate() {
            let Some(t) = c.track(i) else { continue };
            view.sample_name = c.track_sample_name(i).map(str::to_owned);
            view.steps = std::array::from_fn(|s| t.step(s));
            view.mute = t.is_muted();
            view.volume = t.volume();
            view.triggers = c.track_triggers(i);
        }

        d.gate_open = c.is_gate_open();
        d.granular_sample = store
            .get(c.granular_sample_index())
            .map_or_else(|| "-".to_owned(), |a| a.name().to_owned());
        d.selected_param = self.selected_param;
        let s = c.granular_settings();
        let j = c.granular_jitter();
        d.params = [
            (GranularParam::SpawnRate, s.spawn_rate, j.spawn_rate),
            (GranularParam::Duration, s.duration, j.duration),
            (GranularParam::Speed, s.speed, j.speed),
            (GranularParam::Position, s.position, j.position),
        ];
        d.active_grains = c.active_grain_count();
        d.spawn_successes = c.spawn_successes();
        d.spawn_failures = c.spawn_failures();

        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::AudioCommand;
    use crate::testutil;
    use crossbeam_channel::Receiver;

    // the receiver keeps the command queue connected
    fn middle(samples: usize) -> (Middle, Receiver<AudioCommand>) {
        let store = testutil::store(&vec![testutil::constant(100, 0.5); samples]);
        let (tx, rx) = crossbeam_channel::bounded(16);
        (Middle::new(Arc::new(Controls::new(store, tx))), rx)
    }

    #[test]
    fn test_entering_and_leaving_sequencer() {
        let (mut m, _rx) = middle(1);
        m.handle_input(InputEvent::EnterSequencer);
        assert_eq!(m.controls().mode(), Mode::Sequencer);
        assert!(m.controls().is_running());
        m.handle_input(InputEvent::MainMenu);
        assert!(!m.controls().is_running());
        assert_eq!(m.controls().mode(), Mode::MainMenu);
    }

    #[test]
    fn test_entering_and_leaving_granular() {
        let (mut m, _rx) = middle(2);
        m.controls().set_granular_sample_index(1);
        m.handle_input(InputEvent::EnterGranular);
        assert!(m.controls().is_granular_mode());
        assert_eq!(m.controls().granular_sample_index(), 0);
        m.handle_input(InputEvent::GateOpen);
        assert!(m.controls().is_gate_open());

        m.handle_input(InputEvent::EnterSequencer);
        assert!(!m.controls().is_gate_open());
        assert!(!m.controls().is_granular_mode());
        assert!(m.controls().is_running());
    }

    #[test]
    fn test_granular_without_samples_reports() {
        let (mut m, _rx) = middle(0);
        m.handle_input(InputEvent::EnterGranular);
        assert_eq!(m.display_state().status, "no playable sample");
    }

    #[test]
    fn test_page_events_ignored_on_main_menu() {
        let (mut m, _rx) = middle(1);
        m.handle_input(InputEvent::ToggleStep(3));
        m.handle_input(InputEvent::GateOpen);
        assert!(!m.controls().is_step_active(0, 3));
        assert!(!m.controls().is_gate_open());
    }

    #[test]
    fn test_step_editing_on_selected_track() {
        let (mut m, _rx) = middle(1);
        m.handle_input(InputEvent::EnterSequencer);
        m.handle_input(InputEvent::NextTrack);
        m.handle_input(InputEvent::ToggleStep(5));
        assert!(m.controls().is_step_active(1, 5));
        assert!(!m.controls().is_step_active(0, 5));
        m.handle_input(InputEvent::ToggleStep(5));
        assert!(!m.controls().is_step_active(1, 5));
    }

    #[test]
    fn test_track_sample_cycles_through_unassigned() {
        let (mut m, _rx) = middle(2);
        m.handle_input(InputEvent::EnterSequencer);
        let sample = |m: &Middle| m.controls().track(0).and_then(|t| t.sample());
        m.handle_input(InputEvent::NextTrackSample);
        assert_eq!(sample(&m), Some(0));
        m.handle_input(InputEvent::NextTrackSample);
        assert_eq!(sample(&m), Some(1));
        m.handle_input(InputEvent::NextTrackSample);
        assert_eq!(sample(&m), None);
        assert_eq!(m.display_state().tracks[0].sample_name, None);
    }

    #[test]
    fn test_bpm_and_volume_knobs_clamp() {
        let (mut m, _rx) = middle(1);
        m.handle_input(InputEvent::EnterSequencer);
        for _ in 0..200 {
            m.handle_input(InputEvent::AdjustBpm(1));
        }
        assert_eq!(m.controls().bpm(), MAX_BPM);
        m.handle_input(InputEvent::AdjustTrackVolume(0.5));
        assert_eq!(m.controls().track(0).unwrap().volume(), 1.0);
        m.handle_input(InputEvent::AdjustTrackVolume(-2.0));
        assert_eq!(m.controls().track(0).unwrap().volume(), 0.0);
    }

    #[test]
    fn test_granular_knobs_follow_selected_param() {
        let (mut m, _rx) = middle(1);
        m.handle_input(InputEvent::EnterGranular);
        m.handle_input(InputEvent::AdjustGranularParam(-100));
        assert_eq!(m.controls().granular_spawn_rate(), 1.0);
        m.handle_input(InputEvent::NextGranularParam);
        m.handle_input(InputEvent::NextGranularParam);
        m.handle_input(InputEvent::AdjustGranularParam(100));
        assert_eq!(m.controls().granular_speed(), 4.0);
        m.handle_input(InputEvent::AdjustGranularJitter(100));
        assert_eq!(m.controls().granular_jitter().speed, SPEED_JITTER_MAX);

        let d = m.display_state();
        assert_eq!(d.selected_param, GranularParam::Speed);
        assert_eq!(d.params[2], (GranularParam::Speed, 4.0, SPEED_JITTER_MAX));
        assert_eq!(d.granular_sample, "sample0.wav");
    }

    #[test]
    fn test_pad_outside_library_reports() {
        let (mut m, rx) = middle(1);
        m.handle_input(InputEvent::EnterGranular);
        m.handle_input(InputEvent::TriggerPad(0));
        assert!(m.display_state().status.is_empty());
        assert_eq!(rx.try_recv(), Ok(AudioCommand::TriggerSample(0)));
        m.handle_input(InputEvent::TriggerPad(9));
        assert_eq!(m.display_state().status, "no sample on pad 10");
    }
}
