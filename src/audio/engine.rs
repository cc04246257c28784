//! The block entry point. Everything reachable from [`Engine::process`] runs
//! on the audio callback: no allocation, no locks, no I/O.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::Receiver;

use super::controls::{Controls, clip};
use super::frame::StereoFrame;
use super::grains::{GrainEnvelope, GrainPool, SpawnTimer};
use super::metronome::Metronome;
use super::oneshot::OneShots;
use super::sequencer::Sequencer;
use super::store::SampleStore;
use crate::audio_api::AudioCommand;
use crate::shared::*;

pub const DEFAULT_BLOCK_SIZE: usize = 48;

/// Fixed parameters of the audio side, decided before the stream starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub sample_rate: u32,
    pub block_size: usize,
    pub grain_envelope: GrainEnvelope,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: DEFAULT_BLOCK_SIZE,
            grain_envelope: GrainEnvelope::default(),
        }
    }
}

/// xorshift32, enough to scatter grain parameters.
#[derive(Clone, Copy, Debug)]
struct Jitter(u32);

impl Jitter {
    fn next_bipolar(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x >> 8) as f32 / (1u32 << 23) as f32 - 1.0
    }

    fn apply(&mut self, value: f32, amount: f32, range: (f32, f32)) -> f32 {
        if amount <= 0.0 {
            return value;
        }
        clip(value + amount * self.next_bipolar(), range)
    }
}

pub struct Engine {
    store: Arc<SampleStore>,
    controls: Arc<Controls>,
    commands: Receiver<AudioCommand>,

    sample_rate: u32,
    block_size: usize,

    grains: GrainPool,
    spawn_timer: SpawnTimer,
    granular_stop_epoch: u32,
    jitter: Jitter,

    oneshots: OneShots,
    sequencer: Sequencer,
    metronome: Metronome,

    frames_rendered: u64,

    // split buffers for interleaved output, sized once
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl Engine {
    pub fn new(
        store: Arc<SampleStore>,
        controls: Arc<Controls>,
        commands: Receiver<AudioCommand>,
        settings: EngineSettings,
    ) -> Self {
        let block_size = settings.block_size.max(1);
        Self {
            oneshots: OneShots::new(&store),
            sequencer: Sequencer::new(settings.sample_rate, controls.bpm()),
            metronome: Metronome::new(settings.sample_rate),
            grains: GrainPool::new(settings.grain_envelope),
            spawn_timer: SpawnTimer::default(),
            granular_stop_epoch: controls.granular_stop_epoch(),
            jitter: Jitter(0x9E37_79B9),
            store,
            controls,
            commands,
            sample_rate: settings.sample_rate,
            block_size,
            frames_rendered: 0,
            scratch_left: vec![0.0; block_size],
            scratch_right: vec![0.0; block_size],
        }
    }

    /// Builds an engine together with the shared controls and the command
    /// queue feeding it.
    pub fn build(store: Arc<SampleStore>, settings: EngineSettings, queue: usize) -> (Self, Arc<Controls>) {
        let (tx, rx) = crossbeam_channel::bounded(queue.max(1));
        let controls = Arc::new(Controls::new(store.clone(), tx));
        (Self::new(store, controls.clone(), rx, settings), controls)
    }

    pub fn controls(&self) -> &Arc<Controls> {
        &self.controls
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn grains(&self) -> &GrainPool {
        &self.grains
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn oneshots(&self) -> &OneShots {
        &self.oneshots
    }

    /// Renders one block. Both channels are zeroed first; every source adds.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        left.fill(0.0);
        right.fill(0.0);

        self.drain_commands();
        self.sync();

        let now = self.frames_rendered;
        let mode = self.controls.mode();
        match mode {
            Mode::Sequencer => {
                let crossed = self.sequencer.advance(frames as u32, now, &self.controls, &self.store);
                if crossed > 0 && self.controls.is_metronome_enabled() {
                    self.metronome.trigger();
                }
                self.sequencer.mix(&self.controls, &self.store, left, right);
                self.oneshots.mix(&self.controls, &self.store, left, right);
            }
            Mode::Granular => {
                self.auto_spawn(frames);
                self.grains.mix(&self.store, left, right);
                self.oneshots.mix(&self.controls, &self.store, left, right);
            }
            Mode::MainMenu => {}
        }

        if mode.is_audible() && self.controls.is_metronome_enabled() {
            self.metronome.process(left, right);
        }

        self.frames_rendered += frames as u64;
        self.publish_stats();
    }

    /// Fills an interleaved stereo buffer in `block_size` chunks.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        let mut left = std::mem::take(&mut self.scratch_left);
        let mut right = std::mem::take(&mut self.scratch_right);
        for chunk in out.chunks_mut(self.block_size) {
            let n = chunk.len();
            self.process(&mut left[..n], &mut right[..n]);
            for (frame, (&l, &r)) in chunk.iter_mut().zip(left.iter().zip(right.iter())) {
                *frame = StereoFrame { left: l, right: r };
            }
        }
        self.scratch_left = left;
        self.scratch_right = right;
    }

    /// Starts a grain; `None` uses the configured granular sample.
    pub fn spawn_grain(&mut self, sample: Option<usize>, position: f32, duration: f32, speed: f32) -> bool {
        let sample = sample.unwrap_or_else(|| self.controls.granular_sample_index());
        self.grains.spawn(&self.store, sample, position, duration, speed)
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                AudioCommand::TriggerSample(index) => self.oneshots.trigger(index, &self.store),
                AudioCommand::StopSample(index) => self.oneshots.stop(index),
                AudioCommand::StopAllSamples => self.oneshots.stop_all(),
                AudioCommand::SpawnGrain {
                    sample,
                    position,
                    duration,
                    speed,
                } => {
                    self.spawn_grain(sample, position, duration, speed);
                }
            }
        }
    }

    fn sync(&mut self) {
        let c = &self.controls;
        self.sequencer.sync(c, self.frames_rendered);

        let stop = c.granular_stop_epoch();
        if stop != self.granular_stop_epoch {
            self.granular_stop_epoch = stop;
            self.grains.hard_stop();
            self.spawn_timer.reset();
        }

        self.metronome.set_volume(c.metronome_volume());
        self.metronome.set_frequency(c.metronome_frequency());
        if self.metronome.duration() != c.metronome_duration() {
            self.metronome.set_duration(c.metronome_duration());
        }
    }

    fn auto_spawn(&mut self, frames: usize) {
        if !self.controls.is_granular_mode() || !self.controls.is_gate_open() {
            self.spawn_timer.reset();
            return;
        }
        self.spawn_timer.accumulate(frames as f32 / self.sample_rate as f32);

        let base = self.controls.granular_settings();
        let jitter = self.controls.granular_jitter();
        let sample = self.controls.granular_sample_index();
        loop {
            let rate = self.jitter.apply(base.spawn_rate, jitter.spawn_rate, SPAWN_RATE_RANGE);
            if !self.spawn_timer.take(1.0 / rate) {
                break;
            }
            let position = self.jitter.apply(base.position, jitter.position, GRAIN_POSITION_RANGE);
            let duration = self.jitter.apply(base.duration, jitter.duration, GRAIN_DURATION_RANGE);
            let speed = self.jitter.apply(base.speed, jitter.speed, GRAIN_SPEED_RANGE);
            self.grains.spawn(&self.store, sample, position, duration, speed);
        }
    }

    fn publish_stats(&self) {
        let stats = &self.controls.stats;
        stats
            .active_grains
            .store(self.grains.active_count() as u32, Ordering::Relaxed);
        stats.spawn_successes.store(self.grains.successes(), Ordering::Relaxed);
        stats.spawn_failures.store(self.grains.failures(), Ordering::Relaxed);
        stats
            .current_step
            .store(self.sequencer.clock().current_step() as u32, Ordering::Relaxed);
        stats
            .step_started_at
            .store(self.sequencer.step_started_at(), Ordering::Relaxed);
        stats.frames_rendered.store(self.frames_rendered, Ordering::Relaxed);
        for (track, counter) in stats.track_triggers.iter().enumerate() {
            let triggers = self.sequencer.voice(track).map_or(0, |v| v.triggers);
            counter.store(triggers, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn engine(samples: &[Vec<StereoFrame>]) -> (Engine, Arc<Controls>) {
        Engine::build(testutil::store(samples), EngineSettings::default(), 64)
    }

    fn run(engine: &mut Engine, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        for (l, r) in left.chunks_mut(48).zip(right.chunks_mut(48)) {
            engine.process(l, r);
        }
        (left, right)
    }

    #[test]
    fn test_main_menu_is_silent() {
        let (mut e, c) = engine(&[testutil::constant(48_000, 0.5)]);
        c.set_track_sample(0, Some(0));
        c.set_step_active(0, 1, true);
        c.set_running(true);
        c.trigger_sample(0);
        let (l, r) = run(&mut e, 12_000);
        assert!(l.iter().chain(r.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn test_output_is_zeroed_before_mixing() {
        let (mut e, _c) = engine(&[]);
        let mut l = [1.0; 48];
        let mut r = [-1.0; 48];
        e.process(&mut l, &mut r);
        assert_eq!(l, [0.0; 48]);
        assert_eq!(r, [0.0; 48]);
    }

    #[test]
    fn test_two_bars_give_four_triggers() {
        let (mut e, c) = engine(&[testutil::constant(100, 0.5)]);
        c.set_mode(Mode::Sequencer);
        c.set_metronome_enabled(false);
        c.set_track_sample(0, Some(0));
        c.set_step_active(0, 0, true);
        c.set_step_active(0, 8, true);
        c.set_running(true);
        run(&mut e, 2 * 16 * 6000);
        assert_eq!(c.track_triggers(0), 4);
        assert_eq!(c.current_step(), 0);
    }

    #[test]
    fn test_metronome_clicks_on_each_step() {
        let (mut e, c) = engine(&[]);
        c.set_mode(Mode::Sequencer);
        c.set_running(true);
        // the step lands in the block that reaches it
        let (l, _) = run(&mut e, 6000 + 48 * 4);
        assert!(l[..5952].iter().all(|&s| s == 0.0));
        assert!(l[5952..].iter().any(|&s| s != 0.0));

        c.set_metronome_enabled(false);
        let (l, _) = run(&mut e, 12_000);
        assert!(l.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_sequencer_plays_track_sample() {
        let (mut e, c) = engine(&[testutil::constant(1000, 0.5)]);
        c.set_mode(Mode::Sequencer);
        c.set_metronome_enabled(false);
        c.set_track_sample(1, Some(0));
        c.set_step_active(1, 1, true);
        c.set_running(true);
        let (l, r) = run(&mut e, 6048);
        assert_eq!(l[5952], 0.5);
        assert_eq!(r[6047], 0.5);
        assert_eq!(l[5951], 0.0);
    }

    #[test]
    fn test_one_shot_via_command() {
        let (mut e, c) = engine(&[testutil::constant(10, 0.25)]);
        c.set_mode(Mode::Granular);
        c.set_metronome_enabled(false);
        assert!(c.trigger_sample(0));
        let (l, _) = run(&mut e, 48);
        assert_eq!(&l[..10], &[0.25; 10]);
        assert_eq!(l[10], 0.0);
        assert!(!c.trigger_sample(3));
    }

    #[test]
    fn test_stop_and_spawn_commands_reach_the_engine() {
        let (mut e, c) = engine(&[testutil::constant(48_000, 0.5), testutil::constant(48_000, 0.25)]);
        c.set_mode(Mode::Granular);
        c.set_metronome_enabled(false);
        assert!(c.trigger_sample(0));
        assert!(c.trigger_sample(1));
        run(&mut e, 48);
        assert!(e.oneshots().is_playing(0));
        assert!(e.oneshots().is_playing(1));

        assert!(c.stop_sample(0));
        let (l, _) = run(&mut e, 48);
        assert!(!e.oneshots().is_playing(0));
        assert!(e.oneshots().is_playing(1));
        assert_eq!(l[0], 0.25);
        assert!(!c.stop_sample(9));

        assert!(c.stop_all_samples());
        let (l, _) = run(&mut e, 48);
        assert!(!e.oneshots().is_playing(1));
        assert!(l.iter().all(|&s| s == 0.0));

        assert!(c.spawn_grain(Some(1), 0.25, 0.1, 1.0));
        assert!(c.spawn_grain(None, 0.0, 0.1, 1.0));
        run(&mut e, 48);
        assert_eq!(e.grains().successes(), 2);
        assert_eq!(e.grains().slot(0).map(|g| g.sample), Some(1));
        assert_eq!(e.grains().slot(1).map(|g| g.sample), Some(0));
    }

    #[test]
    fn test_gate_reopen_does_not_burst() {
        let (mut e, c) = engine(&[testutil::constant(48_000, 0.5)]);
        c.set_mode(Mode::Granular);
        c.set_granular_mode(true);
        c.set_metronome_enabled(false);
        c.set_granular_spawn_rate(100.0);
        c.set_granular_duration(1.0);

        c.set_gate_open(true);
        run(&mut e, 48 * 20);
        c.set_gate_open(false);
        run(&mut e, 48_000);
        let before = e.grains().successes() + e.grains().failures();

        c.set_gate_open(true);
        run(&mut e, 48);
        let after = e.grains().successes() + e.grains().failures();
        assert!(after - before <= 1);
    }

    #[test]
    fn test_large_block_spawns_several_grains() {
        let (mut e, c) = engine(&[testutil::constant(48_000, 0.5)]);
        c.set_mode(Mode::Granular);
        c.set_granular_mode(true);
        c.set_metronome_enabled(false);
        c.set_granular_spawn_rate(4.0);
        c.set_gate_open(true);
        let mut l = vec![0.0; 24_000];
        let mut r = vec![0.0; 24_000];
        e.process(&mut l, &mut r);
        assert_eq!(e.grains().successes(), 2);
    }

    #[test]
    fn test_gate_closed_never_spawns() {
        let (mut e, c) = engine(&[testutil::constant(48_000, 0.5)]);
        c.set_mode(Mode::Granular);
        c.set_granular_mode(true);
        run(&mut e, 48_000);
        assert_eq!(e.grains().successes(), 0);
        assert_eq!(c.active_grain_count(), 0);
    }

    #[test]
    fn test_disabling_granular_clears_everything() {
        let (mut e, c) = engine(&[testutil::constant(48_000, 0.5)]);
        c.set_mode(Mode::Granular);
        c.set_granular_mode(true);
        c.set_granular_duration(1.0);
        c.set_gate_open(true);
        run(&mut e, 4800);
        assert!(c.active_grain_count() > 0);

        c.set_granular_mode(false);
        assert_eq!(c.active_grain_count(), 0);
        assert_eq!(c.spawn_successes(), 0);
        run(&mut e, 48);
        assert_eq!(e.grains().active_count(), 0);
        assert_eq!(c.stats.active_grains.load(Ordering::Relaxed), 0);
        assert_eq!(c.stats.spawn_successes.load(Ordering::Relaxed), 0);

        c.set_granular_mode(true);
        assert_eq!(c.active_grain_count(), 0);
        assert_eq!(c.spawn_failures(), 0);
    }

    #[test]
    fn test_spawn_uses_configured_sample() {
        let (mut e, c) = engine(&[testutil::constant(100, 0.5), testutil::constant(100, 0.5)]);
        assert!(c.set_granular_sample_index(1));
        assert!(e.spawn_grain(None, 0.0, 0.001, 1.0));
        assert_eq!(e.grains().slot(0).map(|g| g.sample), Some(1));
        assert!(!e.spawn_grain(Some(7), 0.0, 0.001, 1.0));
    }

    #[test]
    fn test_ninth_spawn_fails() {
        let (mut e, _c) = engine(&[testutil::constant(48_000, 0.5)]);
        for _ in 0..MAX_GRAINS {
            assert!(e.spawn_grain(Some(0), 0.5, 0.5, 1.0));
        }
        let before: Vec<_> = e.grains().grains().copied().collect();
        assert!(!e.spawn_grain(Some(0), 0.0, 0.5, 1.0));
        let after: Vec<_> = e.grains().grains().copied().collect();
        assert_eq!(before, after);
        assert_eq!(e.grains().failures(), 1);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut j = Jitter(1);
        for _ in 0..10_000 {
            let x = j.next_bipolar();
            assert!((-1.0..1.0).contains(&x));
            let v = j.apply(0.5, 0.5, GRAIN_POSITION_RANGE);
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(j.apply(30.0, 0.0, SPAWN_RATE_RANGE), 30.0);
    }

    #[test]
    fn test_render_block_interleaves() {
        let (mut e, c) = engine(&[testutil::constant(200, 0.5)]);
        c.set_mode(Mode::Granular);
        c.set_metronome_enabled(false);
        c.trigger_sample(0);
        let mut out = vec![StereoFrame::zero(); 100];
        e.render_block(&mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::mono(0.5)));
        assert_eq!(c.frames_rendered(), 100);
    }

    #[test]
    fn test_reset_returns_to_step_zero() {
        let (mut e, c) = engine(&[]);
        c.set_mode(Mode::Sequencer);
        c.set_running(true);
        run(&mut e, 6000 * 3);
        assert_eq!(c.current_step(), 3);
        c.reset_sequencer();
        run(&mut e, 48);
        assert_eq!(c.current_step(), 0);
    }
}
