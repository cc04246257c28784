use super::frame::StereoFrame;

/// A position moving through one sample's PCM at a given speed.
///
/// `finished` is the only liveness marker: a finished cursor renders nothing
/// and may be restarted or re-windowed at will.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackCursor {
    sample: usize,
    position: f64,
    start: f64,
    end: f64, // exclusive
    speed: f32,
    finished: bool,
}

impl PlaybackCursor {
    /// A finished cursor over nothing.
    pub const fn idle() -> Self {
        Self {
            sample: 0,
            position: 0.0,
            start: 0.0,
            end: 0.0,
            speed: 1.0,
            finished: true,
        }
    }

    /// A finished cursor spanning the whole sample; `restart` starts it.
    pub fn whole(sample: usize, num_frames: usize) -> Self {
        Self {
            sample,
            position: 0.0,
            start: 0.0,
            end: num_frames as f64,
            speed: 1.0,
            finished: true,
        }
    }

    /// A running cursor over `[start, end)` of the sample.
    pub fn window(sample: usize, start: f64, end: f64, speed: f32) -> Self {
        Self {
            sample,
            position: start,
            start,
            end,
            speed,
            finished: false,
        }
    }

    pub fn restart(&mut self) {
        self.position = self.start;
        self.finished = false;
    }

    pub fn stop(&mut self) {
        self.finished = true;
    }

    pub fn sample(&self) -> usize {
        self.sample
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Progress through the window in [0, 1].
    pub fn progress(&self) -> f32 {
        let span = self.end - self.start;
        if span <= 0.0 {
            return 1.0;
        }
        ((self.position - self.start) / span).clamp(0.0, 1.0) as f32
    }

    /// Mixes up to `left.len()` frames of the sample into the output, adding
    /// to whatever is already there.
    pub fn tick(
        &mut self,
        pcm: &[StereoFrame],
        speed: f32,
        gain: f32,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        self.tick_shaped(pcm, speed, gain, left, right, |_| 1.0);
    }

    /// Like [`tick`](Self::tick), with an extra per-frame gain taken from
    /// `shape(progress)`.
    pub fn tick_shaped(
        &mut self,
        pcm: &[StereoFrame],
        speed: f32,
        gain: f32,
        left: &mut [f32],
        right: &mut [f32],
        mut shape: impl FnMut(f32) -> f32,
    ) {
        if self.finished {
            return;
        }
        let end = self.end.min(pcm.len() as f64);
        let step = speed as f64;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.position >= end || self.position < 0.0 {
                self.finished = true;
                break;
            }

            // linear interpolation between neighbouring frames
            let i = self.position as usize;
            let frac = (self.position - i as f64) as f32;
            let s0 = pcm[i];
            let s1 = pcm.get(i + 1).copied().unwrap_or(s0);
            let frame = s0.lerp(s1, frac);

            let g = gain * shape(self.progress());
            *l += frame.left * g;
            *r += frame.right * g;

            self.position += step;
            if self.position >= end {
                self.finished = true;
                break;
            }
        }
    }
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self::idle()
    }
}
