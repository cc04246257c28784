//! Sixteen-step, three-track sequencer clocked by audio blocks.
//!
//! Tempo, transport and patterns live in [`Controls`]; this side owns the
//! sample accumulator, the current step and each track's playback cursor.

use super::controls::Controls;
use super::cursor::PlaybackCursor;
use super::store::SampleStore;
use crate::shared::{NUM_STEPS, NUM_TRACKS};

/// Frames per sixteenth note at `bpm`.
pub fn samples_per_step(sample_rate: u32, bpm: u32) -> u32 {
    (sample_rate as u64 * 60 / (bpm.max(1) as u64 * 4)) as u32
}

#[derive(Debug)]
pub struct StepClock {
    sample_rate: u32,
    bpm: u32,
    samples_per_step: u32,
    since_last_step: u32,
    current_step: usize,
}

impl StepClock {
    pub fn new(sample_rate: u32, bpm: u32) -> Self {
        Self {
            sample_rate,
            bpm,
            samples_per_step: samples_per_step(sample_rate, bpm),
            since_last_step: 0,
            current_step: 0,
        }
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        if bpm != self.bpm {
            self.bpm = bpm;
            self.samples_per_step = samples_per_step(self.sample_rate, bpm);
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn samples_per_step(&self) -> u32 {
        self.samples_per_step
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Stopped → running: count the next step from now.
    pub fn start(&mut self) {
        self.since_last_step = 0;
    }

    pub fn reset(&mut self) {
        self.current_step = 0;
        self.since_last_step = 0;
    }

    /// Consumes `frames` and calls `on_step` for every step boundary crossed,
    /// however many fit in one block.
    pub fn advance(&mut self, frames: u32, mut on_step: impl FnMut(usize)) {
        let step_len = self.samples_per_step.max(1);
        self.since_last_step += frames;
        while self.since_last_step >= step_len {
            self.since_last_step -= step_len;
            self.current_step = (self.current_step + 1) % NUM_STEPS;
            on_step(self.current_step);
        }
    }
}

/// One track's playback state.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackVoice {
    pub cursor: PlaybackCursor,
    pub triggers: u32,
}

#[derive(Debug)]
pub struct Sequencer {
    clock: StepClock,
    voices: [TrackVoice; NUM_TRACKS],
    run_epoch: u32,
    reset_epoch: u32,
    step_started_at: u64,
}

impl Sequencer {
    pub fn new(sample_rate: u32, bpm: u32) -> Self {
        Self {
            clock: StepClock::new(sample_rate, bpm),
            voices: [TrackVoice::default(); NUM_TRACKS],
            run_epoch: 0,
            reset_epoch: 0,
            step_started_at: 0,
        }
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn voice(&self, track: usize) -> Option<&TrackVoice> {
        self.voices.get(track)
    }

    pub fn step_started_at(&self) -> u64 {
        self.step_started_at
    }

    /// Picks up tempo and transport changes made since the last block.
    /// `now` is the running frame count, used only for the step timestamp.
    pub fn sync(&mut self, controls: &Controls, now: u64) {
        self.clock.set_bpm(controls.bpm());

        let reset = controls.reset_epoch();
        if reset != self.reset_epoch {
            self.reset_epoch = reset;
            self.clock.reset();
            self.step_started_at = now;
        }
        let run = controls.run_epoch();
        if run != self.run_epoch {
            self.run_epoch = run;
            self.clock.start();
            self.step_started_at = now;
        }
    }

    /// Advances the clock by one block and triggers every track whose step
    /// fires. Returns how many steps were crossed.
    pub fn advance(&mut self, frames: u32, now: u64, controls: &Controls, store: &SampleStore) -> u32 {
        if !controls.is_running() {
            return 0;
        }
        let mut crossed = 0;
        let voices = &mut self.voices;
        self.clock.advance(frames, |step| {
            crossed += 1;
            trigger_step(voices, step, controls, store);
        });
        if crossed > 0 {
            self.step_started_at = now;
        }
        crossed
    }

    /// Mixes each track's one-shot into the block at the track's volume.
    pub fn mix(&mut self, controls: &Controls, store: &SampleStore, left: &mut [f32], right: &mut [f32]) {
        for (voice, track) in self.voices.iter_mut().zip(controls.tracks()) {
            let sample = voice.cursor.sample();
            if let Some(pcm) = store.pcm(sample) {
                voice
                    .cursor
                    .tick(pcm, controls.sample_speed(sample), track.volume(), left, right);
            }
        }
    }
}

fn trigger_step(voices: &mut [TrackVoice; NUM_TRACKS], step: usize, controls: &Controls, store: &SampleStore) {
    for (voice, track) in voices.iter_mut().zip(controls.tracks()) {
        if !track.fires_at(step) {
            continue;
        }
        let Some(sample) = track.sample() else {
            continue;
        };
        let Some(asset) = store.get(sample).filter(|a| a.audio_ready) else {
            continue;
        };
        voice.cursor = PlaybackCursor::whole(sample, asset.num_frames());
        voice.cursor.restart();
        voice.triggers += 1;
    }
}
