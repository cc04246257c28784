//! Bounded-pool granular playback.
//!
//! Eight pre-allocated slots; a free slot is `None`. Spawning takes the first
//! free slot and never steals a playing grain. Mixdown scales every active
//! grain by `1 / active`, so the summed output stays bounded however dense the
//! cloud gets (each grain gets quieter as more overlap).

use super::cursor::PlaybackCursor;
use super::store::SampleStore;
use crate::shared::{GRAIN_SPEED_RANGE, MAX_GRAINS};

/// Amplitude shape applied across each grain's window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GrainEnvelope {
    /// Hard-edged window.
    Hard,
    /// Linear ramps over the first and last `fraction` of the window.
    Fade { fraction: f32 },
}

impl GrainEnvelope {
    pub fn fade(fraction: f32) -> Self {
        GrainEnvelope::Fade {
            fraction: fraction.clamp(0.0, 0.5),
        }
    }

    #[inline]
    pub fn gain(self, progress: f32) -> f32 {
        match self {
            GrainEnvelope::Hard => 1.0,
            GrainEnvelope::Fade { fraction } if fraction <= 0.0 => 1.0,
            GrainEnvelope::Fade { fraction } => {
                let rise = progress / fraction;
                let fall = (1.0 - progress) / fraction;
                rise.min(fall).clamp(0.0, 1.0)
            }
        }
    }
}

impl Default for GrainEnvelope {
    fn default() -> Self {
        GrainEnvelope::fade(0.1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grain {
    pub cursor: PlaybackCursor,
    pub sample: usize,
    /// Progress through the window, [0, 1).
    pub envelope_phase: f32,
}

#[derive(Debug)]
pub struct GrainPool {
    slots: [Option<Grain>; MAX_GRAINS],
    envelope: GrainEnvelope,
    successes: u32,
    failures: u32,
}

impl GrainPool {
    pub fn new(envelope: GrainEnvelope) -> Self {
        Self {
            slots: [None; MAX_GRAINS],
            envelope,
            successes: 0,
            failures: 0,
        }
    }

    pub fn set_envelope(&mut self, envelope: GrainEnvelope) {
        self.envelope = envelope;
    }

    /// Starts a grain of `duration` seconds at normalised `start_position`.
    ///
    /// Returns false (and counts a failure) when the sample is unknown, not
    /// resident, or every slot is busy.
    pub fn spawn(
        &mut self,
        store: &SampleStore,
        sample: usize,
        start_position: f32,
        duration: f32,
        speed: f32,
    ) -> bool {
        let asset = match store.get(sample) {
            Some(a) if a.audio_ready && a.num_frames() > 0 => a,
            _ => {
                self.failures += 1;
                return false;
            }
        };
        let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) else {
            self.failures += 1;
            return false;
        };

        let total = asset.num_frames() as f64;
        let start = (start_position.max(0.0) as f64 * total).min(total - 1.0);
        let end = (start + duration as f64 * asset.sample_rate() as f64).min(total);
        // a zero speed would park the grain in its slot forever
        let speed = speed.max(GRAIN_SPEED_RANGE.0).min(GRAIN_SPEED_RANGE.1);

        *slot = Some(Grain {
            cursor: PlaybackCursor::window(sample, start, end, speed),
            sample,
            envelope_phase: 0.0,
        });
        self.successes += 1;
        true
    }

    /// Silences every grain at once and zeroes the counters.
    pub fn hard_stop(&mut self) {
        self.slots = [None; MAX_GRAINS];
        self.successes = 0;
        self.failures = 0;
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn grains(&self) -> impl Iterator<Item = &Grain> {
        self.slots.iter().flatten()
    }

    pub fn slot(&self, index: usize) -> Option<&Grain> {
        self.slots.get(index)?.as_ref()
    }

    /// Per-grain gain for `active` concurrent grains.
    pub fn fairness_gain(active: usize) -> f32 {
        if active == 0 { 0.0 } else { 1.0 / active as f32 }
    }

    /// Mixes every active grain into the block and frees the ones that ended.
    /// Returns the number of grains that were active going in.
    pub fn mix(&mut self, store: &SampleStore, left: &mut [f32], right: &mut [f32]) -> usize {
        let active = self.active_count();
        let gain = Self::fairness_gain(active);
        let envelope = self.envelope;

        for slot in self.slots.iter_mut() {
            let Some(grain) = slot.as_mut() else {
                continue;
            };
            match store.pcm(grain.sample) {
                Some(pcm) => {
                    let speed = grain.cursor.speed();
                    grain
                        .cursor
                        .tick_shaped(pcm, speed, gain, left, right, |p| envelope.gain(p));
                    grain.envelope_phase = grain.cursor.progress();
                }
                None => grain.cursor.stop(),
            }
            if grain.cursor.is_finished() {
                *slot = None;
            }
        }
        active
    }
}

impl Default for GrainPool {
    fn default() -> Self {
        Self::new(GrainEnvelope::default())
    }
}

/// Accumulates elapsed time between auto-spawns.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpawnTimer {
    since_last: f32,
}

impl SpawnTimer {
    pub fn accumulate(&mut self, seconds: f32) {
        self.since_last += seconds;
    }

    /// Consumes one interval if enough time has built up.
    pub fn take(&mut self, interval: f32) -> bool {
        if interval > 0.0 && self.since_last >= interval {
            self.since_last = (self.since_last - interval).max(0.0);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.since_last = 0.0;
    }

    pub fn elapsed(&self) -> f32 {
        self.since_last
    }
}
