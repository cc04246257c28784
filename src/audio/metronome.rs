//! Click generator: a free-running sine gated by a percussive attack/decay
//! envelope. Mixed additively every block; between clicks the envelope sits at
//! zero, so no separate "active" flag is needed.

use std::f32::consts::TAU;

pub const DEFAULT_FREQUENCY: f32 = 800.0;
pub const DEFAULT_DURATION: f32 = 0.01;
pub const DEFAULT_VOLUME: f32 = 0.5;

const ATTACK_TIME: f32 = 0.001;
const MIN_DECAY_TIME: f32 = 0.001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickStage {
    Idle,
    Attack,
    Decay,
}

#[derive(Debug)]
pub struct Metronome {
    sample_rate: f32,
    phase: f32, // [0, 1)
    frequency: f32,
    volume: f32,
    duration: f32,
    attack_step: f32,
    decay_step: f32,
    stage: ClickStage,
    level: f32,
}

impl Metronome {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        let mut m = Self {
            sample_rate,
            phase: 0.0,
            frequency: DEFAULT_FREQUENCY,
            volume: DEFAULT_VOLUME,
            duration: DEFAULT_DURATION,
            attack_step: 1.0 / (ATTACK_TIME * sample_rate).max(1.0),
            decay_step: 0.0,
            stage: ClickStage::Idle,
            level: 0.0,
        };
        m.set_duration(DEFAULT_DURATION);
        m
    }

    /// Restarts the attack from the current level rather than from zero, so a
    /// retrigger mid-click does not jump.
    pub fn trigger(&mut self) {
        self.stage = ClickStage::Attack;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = hz;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Total click length; attack is fixed, decay takes the rest.
    pub fn set_duration(&mut self, seconds: f32) {
        self.duration = seconds;
        let decay = (seconds - ATTACK_TIME).max(MIN_DECAY_TIME);
        self.decay_step = 1.0 / (decay * self.sample_rate).max(1.0);
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn stage(&self) -> ClickStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    #[inline]
    fn next_level(&mut self) -> f32 {
        match self.stage {
            ClickStage::Idle => {}
            ClickStage::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = ClickStage::Decay;
                }
            }
            ClickStage::Decay => {
                self.level -= self.decay_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = ClickStage::Idle;
                }
            }
        }
        self.level
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let inc = self.frequency / self.sample_rate;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let env = self.next_level();
            let osc = (self.phase * TAU).sin();
            self.phase += inc;
            self.phase -= self.phase.floor();

            let click = osc * env * self.volume;
            *l += click;
            *r += click;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(m: &mut Metronome, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut l = vec![0.0; frames];
        let mut r = vec![0.0; frames];
        m.process(&mut l, &mut r);
        (l, r)
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |a, x| a.max(x.abs()))
    }

    #[test]
    fn test_silent_until_triggered() {
        let mut m = Metronome::new(48_000);
        let (l, r) = render(&mut m, 480);
        assert_eq!(peak(&l), 0.0);
        assert_eq!(peak(&r), 0.0);
    }

    #[test]
    fn test_click_lasts_its_duration() {
        let mut m = Metronome::new(48_000);
        m.trigger();
        // 10 ms at 48 kHz = 480 frames
        let (l, r) = render(&mut m, 470);
        assert!(peak(&l) > 0.1);
        assert_eq!(l, r);
        let _ = render(&mut m, 20);
        assert_eq!(m.stage(), ClickStage::Idle);
        let (l, _) = render(&mut m, 480);
        assert_eq!(peak(&l), 0.0);
    }

    #[test]
    fn test_output_is_added() {
        let mut m = Metronome::new(48_000);
        let mut l = vec![0.25; 8];
        let mut r = vec![0.25; 8];
        m.process(&mut l, &mut r);
        assert_eq!(l, vec![0.25; 8]);
    }

    #[test]
    fn test_volume_clamps_and_scales() {
        let mut m = Metronome::new(48_000);
        m.set_volume(3.0);
        assert_eq!(m.volume(), 1.0);
        m.set_volume(-1.0);
        assert_eq!(m.volume(), 0.0);
        m.trigger();
        let (l, _) = render(&mut m, 480);
        assert_eq!(peak(&l), 0.0);
    }

    #[test]
    fn test_decay_has_a_floor() {
        let mut m = Metronome::new(48_000);
        m.set_duration(0.0);
        assert_eq!(m.duration(), 0.0);
        m.trigger();
        // 1 ms attack + 1 ms minimum decay
        let _ = render(&mut m, 120);
        assert_eq!(m.stage(), ClickStage::Idle);
    }

    #[test]
    fn test_retrigger_keeps_current_level() {
        let mut m = Metronome::new(48_000);
        m.trigger();
        let _ = render(&mut m, 200); // into the decay
        let level = m.level();
        assert!(level > 0.0 && level < 1.0);
        m.trigger();
        assert_eq!(m.stage(), ClickStage::Attack);
        let _ = render(&mut m, 1);
        assert!(m.level() > level);
    }
}
