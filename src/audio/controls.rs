//! Parameters shared between the main loop and the audio callback.
//!
//! Every field has exactly one writer. Scalars are plain atomics with relaxed
//! ordering; nothing here spans more than one field, so a reader can never
//! observe a torn update. Events that must reset audio-side state are either
//! epoch counters the engine compares once per block, or [`AudioCommand`]s
//! pushed onto a bounded queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};

use crossbeam_channel::Sender;

use super::store::SampleStore;
use crate::audio_api::AudioCommand;
use crate::shared::*;

/// `f32` stored as its bit pattern.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

pub(crate) fn clip(v: f32, (lo, hi): (f32, f32)) -> f32 {
    // NaN from a wild knob lands on the floor rather than poisoning the engine
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}

#[derive(Debug)]
pub struct TrackControls {
    sample: AtomicI32, // -1 = unassigned
    steps: AtomicU16,  // bit n = step n
    mute: AtomicBool,
    volume: AtomicF32,
}

impl TrackControls {
    fn new() -> Self {
        Self {
            sample: AtomicI32::new(-1),
            steps: AtomicU16::new(0),
            mute: AtomicBool::new(false),
            volume: AtomicF32::new(1.0),
        }
    }

    pub fn sample(&self) -> Option<usize> {
        usize::try_from(self.sample.load(Ordering::Relaxed)).ok()
    }

    pub fn steps(&self) -> u16 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn step(&self, step: usize) -> bool {
        step < NUM_STEPS && self.steps() & (1 << step) != 0
    }

    pub fn is_muted(&self) -> bool {
        self.mute.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    /// Trigger predicate for one step of this track.
    pub fn fires_at(&self, step: usize) -> bool {
        self.step(step) && self.sample().is_some() && !self.is_muted()
    }
}

/// Values the audio side publishes for on-screen diagnostics.
#[derive(Debug, Default)]
pub struct Stats {
    pub active_grains: AtomicU32,
    pub spawn_successes: AtomicU32,
    pub spawn_failures: AtomicU32,
    pub current_step: AtomicU32,
    pub step_started_at: AtomicU64, // frame stamp, display only
    pub frames_rendered: AtomicU64,
    pub track_triggers: [AtomicU32; NUM_TRACKS],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GranularSettings {
    pub spawn_rate: f32,
    pub duration: f32,
    pub speed: f32,
    pub position: f32,
}

#[derive(Debug)]
pub struct Controls {
    store: Arc<SampleStore>,
    commands: Sender<AudioCommand>,

    mode: AtomicU8,

    // granular
    spawn_rate: AtomicF32,
    grain_duration: AtomicF32,
    grain_speed: AtomicF32,
    grain_position: AtomicF32,
    spawn_rate_jitter: AtomicF32,
    duration_jitter: AtomicF32,
    speed_jitter: AtomicF32,
    position_jitter: AtomicF32,
    gate_open: AtomicBool,
    granular_enabled: AtomicBool,
    granular_sample: AtomicU32,
    granular_stop_epoch: AtomicU32,

    // one-shots
    sample_speeds: [AtomicF32; MAX_SAMPLES],

    // sequencer
    bpm: AtomicU32,
    running: AtomicBool,
    run_epoch: AtomicU32,
    reset_epoch: AtomicU32,
    tracks: [TrackControls; NUM_TRACKS],

    // metronome
    metronome_enabled: AtomicBool,
    metronome_volume: AtomicF32,
    metronome_frequency: AtomicF32,
    metronome_duration: AtomicF32,

    pub stats: Stats,
}

impl Controls {
    pub fn new(store: Arc<SampleStore>, commands: Sender<AudioCommand>) -> Self {
        Self {
            store,
            commands,
            mode: AtomicU8::new(Mode::MainMenu as u8),
            spawn_rate: AtomicF32::new(30.0),
            grain_duration: AtomicF32::new(0.1),
            grain_speed: AtomicF32::new(1.0),
            grain_position: AtomicF32::new(0.5),
            spawn_rate_jitter: AtomicF32::new(0.0),
            duration_jitter: AtomicF32::new(0.0),
            speed_jitter: AtomicF32::new(0.0),
            position_jitter: AtomicF32::new(0.0),
            gate_open: AtomicBool::new(false),
            granular_enabled: AtomicBool::new(false),
            granular_sample: AtomicU32::new(0),
            granular_stop_epoch: AtomicU32::new(0),
            sample_speeds: std::array::from_fn(|_| AtomicF32::new(1.0)),
            bpm: AtomicU32::new(120),
            running: AtomicBool::new(false),
            run_epoch: AtomicU32::new(0),
            reset_epoch: AtomicU32::new(0),
            tracks: std::array::from_fn(|_| TrackControls::new()),
            metronome_enabled: AtomicBool::new(true),
            metronome_volume: AtomicF32::new(0.5),
            metronome_frequency: AtomicF32::new(800.0),
            metronome_duration: AtomicF32::new(0.01),
            stats: Stats::default(),
        }
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    // ── Mode ──────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Relaxed);
    }

    // ── Granular ──────────────────────────────────────────────────

    pub fn set_granular_spawn_rate(&self, rate: f32) {
        self.spawn_rate.store(clip(rate, SPAWN_RATE_RANGE));
    }

    pub fn set_granular_duration(&self, seconds: f32) {
        self.grain_duration.store(clip(seconds, GRAIN_DURATION_RANGE));
    }

    pub fn set_granular_speed(&self, speed: f32) {
        self.grain_speed.store(clip(speed, GRAIN_SPEED_RANGE));
    }

    pub fn set_granular_position(&self, position: f32) {
        self.grain_position.store(clip(position, GRAIN_POSITION_RANGE));
    }

    pub fn granular_spawn_rate(&self) -> f32 {
        self.spawn_rate.load()
    }

    pub fn granular_duration(&self) -> f32 {
        self.grain_duration.load()
    }

    pub fn granular_speed(&self) -> f32 {
        self.grain_speed.load()
    }

    pub fn granular_position(&self) -> f32 {
        self.grain_position.load()
    }

    pub fn granular_settings(&self) -> GranularSettings {
        GranularSettings {
            spawn_rate: self.granular_spawn_rate(),
            duration: self.granular_duration(),
            speed: self.granular_speed(),
            position: self.granular_position(),
        }
    }

    pub fn set_spawn_rate_jitter(&self, amount: f32) {
        self.spawn_rate_jitter.store(clip(amount, (0.0, SPAWN_RATE_JITTER_MAX)));
    }

    pub fn set_duration_jitter(&self, amount: f32) {
        self.duration_jitter.store(clip(amount, (0.0, DURATION_JITTER_MAX)));
    }

    pub fn set_speed_jitter(&self, amount: f32) {
        self.speed_jitter.store(clip(amount, (0.0, SPEED_JITTER_MAX)));
    }

    pub fn set_position_jitter(&self, amount: f32) {
        self.position_jitter.store(clip(amount, (0.0, POSITION_JITTER_MAX)));
    }

    /// Per-spawn randomness amounts, in the same units as the settings.
    pub fn granular_jitter(&self) -> GranularSettings {
        GranularSettings {
            spawn_rate: self.spawn_rate_jitter.load(),
            duration: self.duration_jitter.load(),
            speed: self.speed_jitter.load(),
            position: self.position_jitter.load(),
        }
    }

    pub fn set_gate_open(&self, open: bool) {
        self.gate_open.store(open, Ordering::Relaxed);
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate_open.load(Ordering::Relaxed)
    }

    /// Disabling hard-stops every grain on the next block. The grain
    /// diagnostics read 0 while disabled.
    pub fn set_granular_mode(&self, enabled: bool) {
        self.granular_enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.granular_stop_epoch.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_granular_mode(&self) -> bool {
        self.granular_enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn granular_stop_epoch(&self) -> u32 {
        self.granular_stop_epoch.load(Ordering::Relaxed)
    }

    /// Refused unless the sample exists and its PCM is resident.
    pub fn set_granular_sample_index(&self, index: usize) -> bool {
        if !self.store.is_audio_resident(index) {
            return false;
        }
        self.granular_sample.store(index as u32, Ordering::Relaxed);
        true
    }

    pub fn granular_sample_index(&self) -> usize {
        self.granular_sample.load(Ordering::Relaxed) as usize
    }

    /// Queues a grain for the audio side; false if the queue is full.
    pub fn spawn_grain(&self, sample: Option<usize>, position: f32, duration: f32, speed: f32) -> bool {
        self.commands
            .try_send(AudioCommand::SpawnGrain {
                sample,
                position,
                duration,
                speed,
            })
            .is_ok()
    }

    // ── One-shots ─────────────────────────────────────────────────

    pub fn trigger_sample(&self, index: usize) -> bool {
        index < self.store.sample_count() && self.commands.try_send(AudioCommand::TriggerSample(index)).is_ok()
    }

    pub fn stop_sample(&self, index: usize) -> bool {
        index < self.store.sample_count() && self.commands.try_send(AudioCommand::StopSample(index)).is_ok()
    }

    pub fn stop_all_samples(&self) -> bool {
        self.commands.try_send(AudioCommand::StopAllSamples).is_ok()
    }

    // unclamped: a continuous knob feeds this
    pub fn set_sample_speed(&self, index: usize, speed: f32) {
        if index < self.store.sample_count() {
            if let Some(s) = self.sample_speeds.get(index) {
                s.store(speed);
            }
        }
    }

    pub fn sample_speed(&self, index: usize) -> f32 {
        self.sample_speeds.get(index).map_or(1.0, AtomicF32::load)
    }

    // ── Sequencer ─────────────────────────────────────────────────

    pub fn set_bpm(&self, bpm: f32) {
        let bpm = clip(bpm, (MIN_BPM as f32, MAX_BPM as f32)) as u32;
        self.bpm.store(bpm, Ordering::Relaxed);
    }

    pub fn bpm(&self) -> u32 {
        self.bpm.load(Ordering::Relaxed)
    }

    pub fn set_running(&self, running: bool) {
        if running {
            self.run_epoch.fetch_add(1, Ordering::Relaxed);
        }
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub(crate) fn run_epoch(&self) -> u32 {
        self.run_epoch.load(Ordering::Relaxed)
    }

    /// Back to step 0 on the next block.
    pub fn reset_sequencer(&self) {
        self.reset_epoch.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset_epoch(&self) -> u32 {
        self.reset_epoch.load(Ordering::Relaxed)
    }

    pub fn current_step(&self) -> usize {
        self.stats.current_step.load(Ordering::Relaxed) as usize
    }

    pub fn track(&self, index: usize) -> Option<&TrackControls> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[TrackControls; NUM_TRACKS] {
        &self.tracks
    }

    /// `None` unassigns the track. Unknown tracks or samples are ignored.
    pub fn set_track_sample(&self, track: usize, sample: Option<usize>) {
        let Some(t) = self.tracks.get(track) else {
            return;
        };
        match sample {
            None => t.sample.store(-1, Ordering::Relaxed),
            Some(s) if s < self.store.sample_count() => t.sample.store(s as i32, Ordering::Relaxed),
            Some(_) => {}
        }
    }

    pub fn track_sample_name(&self, track: usize) -> Option<&str> {
        let sample = self.tracks.get(track)?.sample()?;
        self.store.get(sample).map(|a| a.name())
    }

    pub fn set_step_active(&self, track: usize, step: usize, active: bool) {
        let Some(t) = self.tracks.get(track) else {
            return;
        };
        if step >= NUM_STEPS {
            return;
        }
        let bit = 1u16 << step;
        if active {
            t.steps.fetch_or(bit, Ordering::Relaxed);
        } else {
            t.steps.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    pub fn is_step_active(&self, track: usize, step: usize) -> bool {
        self.tracks.get(track).is_some_and(|t| t.step(step))
    }

    pub fn set_track_mute(&self, track: usize, mute: bool) {
        if let Some(t) = self.tracks.get(track) {
            t.mute.store(mute, Ordering::Relaxed);
        }
    }

    pub fn set_track_volume(&self, track: usize, volume: f32) {
        if let Some(t) = self.tracks.get(track) {
            t.volume.store(clip(volume, (0.0, 1.0)));
        }
    }

    pub fn track_triggers(&self, track: usize) -> u32 {
        self.stats
            .track_triggers
            .get(track)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    // ── Metronome ─────────────────────────────────────────────────

    pub fn set_metronome_enabled(&self, enabled: bool) {
        self.metronome_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_metronome_enabled(&self) -> bool {
        self.metronome_enabled.load(Ordering::Relaxed)
    }

    pub fn set_metronome_volume(&self, volume: f32) {
        self.metronome_volume.store(clip(volume, (0.0, 1.0)));
    }

    pub fn metronome_volume(&self) -> f32 {
        self.metronome_volume.load()
    }

    pub fn set_metronome_frequency(&self, hz: f32) {
        self.metronome_frequency.store(clip(hz, (20.0, 20_000.0)));
    }

    pub fn metronome_frequency(&self) -> f32 {
        self.metronome_frequency.load()
    }

    pub fn set_metronome_duration(&self, seconds: f32) {
        self.metronome_duration.store(clip(seconds, (0.0, 1.0)));
    }

    pub fn metronome_duration(&self) -> f32 {
        self.metronome_duration.load()
    }

    // ── Diagnostics ───────────────────────────────────────────────

    pub fn active_grain_count(&self) -> u32 {
        self.granular_stat(&self.stats.active_grains)
    }

    pub fn spawn_successes(&self) -> u32 {
        self.granular_stat(&self.stats.spawn_successes)
    }

    pub fn spawn_failures(&self) -> u32 {
        self.granular_stat(&self.stats.spawn_failures)
    }

    fn granular_stat(&self, counter: &AtomicU32) -> u32 {
        if self.is_granular_mode() {
            counter.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.stats.frames_rendered.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn controls() -> Controls {
        let (tx, _rx) = crossbeam_channel::bounded(4);
        Controls::new(testutil::store(&[testutil::constant(100, 0.5)]), tx)
    }

    #[test]
    fn test_granular_setters_clip() {
        let c = controls();
        c.set_granular_spawn_rate(0.0);
        assert_eq!(c.granular_spawn_rate(), 1.0);
        c.set_granular_spawn_rate(500.0);
        assert_eq!(c.granular_spawn_rate(), 100.0);
        c.set_granular_duration(-1.0);
        assert_eq!(c.granular_duration(), 0.01);
        c.set_granular_speed(10.0);
        assert_eq!(c.granular_speed(), 4.0);
        c.set_granular_position(f32::NAN);
        assert_eq!(c.granular_position(), 0.0);
        c.set_speed_jitter(9.0);
        assert_eq!(c.granular_jitter().speed, SPEED_JITTER_MAX);
    }

    #[test]
    fn test_bpm_is_clamped_and_truncated() {
        let c = controls();
        c.set_bpm(10.0);
        assert_eq!(c.bpm(), 60);
        c.set_bpm(999.0);
        assert_eq!(c.bpm(), 180);
        c.set_bpm(133.7);
        assert_eq!(c.bpm(), 133);
    }

    #[test]
    fn test_invalid_track_and_step_are_ignored() {
        let c = controls();
        c.set_step_active(3, 0, true);
        c.set_step_active(0, 16, true);
        assert_eq!(c.tracks().iter().map(|t| t.steps()).sum::<u16>(), 0);

        c.set_step_active(1, 15, true);
        assert!(c.is_step_active(1, 15));
        assert!(!c.is_step_active(1, 16));
        assert!(!c.is_step_active(7, 0));
        c.set_step_active(1, 15, false);
        assert!(!c.is_step_active(1, 15));
    }

    #[test]
    fn test_track_sample_assignment() {
        let c = controls();
        c.set_track_sample(0, Some(5)); // no such sample
        assert_eq!(c.track(0).unwrap().sample(), None);
        c.set_track_sample(0, Some(0));
        assert_eq!(c.track_sample_name(0), Some("sample0.wav"));
        c.set_track_sample(0, None);
        assert_eq!(c.track_sample_name(0), None);
        c.set_track_sample(9, Some(0));
        assert!(c.track(9).is_none());
    }

    #[test]
    fn test_trigger_predicate() {
        let c = controls();
        c.set_step_active(0, 4, true);
        let t = c.track(0).unwrap();
        assert!(!t.fires_at(4)); // unassigned
        c.set_track_sample(0, Some(0));
        assert!(t.fires_at(4));
        assert!(!t.fires_at(5));
        c.set_track_mute(0, true);
        assert!(!t.fires_at(4));
    }

    #[test]
    fn test_disabling_granular_masks_diagnostics() {
        let c = controls();
        c.set_granular_mode(true);
        c.stats.spawn_successes.store(4, Ordering::Relaxed);
        c.stats.spawn_failures.store(2, Ordering::Relaxed);
        c.stats.active_grains.store(3, Ordering::Relaxed);
        assert_eq!(c.spawn_successes(), 4);
        let epoch = c.granular_stop_epoch();

        c.set_granular_mode(false);
        assert_eq!(c.spawn_successes(), 0);
        assert_eq!(c.spawn_failures(), 0);
        assert_eq!(c.active_grain_count(), 0);
        assert_eq!(c.granular_stop_epoch(), epoch + 1);
        // only the engine writes the counters
        assert_eq!(c.stats.spawn_successes.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_granular_sample_index_requires_resident_pcm() {
        let c = controls();
        assert!(!c.set_granular_sample_index(1));
        assert!(c.set_granular_sample_index(0));
        assert_eq!(c.granular_sample_index(), 0);
    }

    #[test]
    fn test_sample_speed_is_unclamped_but_bounds_checked() {
        let c = controls();
        c.set_sample_speed(0, 12.0);
        assert_eq!(c.sample_speed(0), 12.0);
        c.set_sample_speed(1, 3.0);
        assert_eq!(c.sample_speed(1), 1.0);
    }

    #[test]
    fn test_full_queue_drops_triggers() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let c = Controls::new(testutil::store(&[testutil::constant(10, 0.5)]), tx);
        assert!(c.trigger_sample(0));
        assert!(!c.trigger_sample(0));
        assert!(!c.trigger_sample(3));
    }
}
