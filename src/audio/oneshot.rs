use super::controls::Controls;
use super::cursor::PlaybackCursor;
use super::store::SampleStore;
use crate::shared::MAX_SAMPLES;

/// One cursor per loaded sample for direct triggering.
/// Retriggering a sample restarts it from the top; it never layers.
#[derive(Debug)]
pub struct OneShots {
    cursors: [PlaybackCursor; MAX_SAMPLES],
}

impl OneShots {
    pub fn new(store: &SampleStore) -> Self {
        let mut cursors = [PlaybackCursor::idle(); MAX_SAMPLES];
        for asset in store.iter().filter(|a| a.audio_ready) {
            if let Some(c) = cursors.get_mut(asset.id) {
                *c = PlaybackCursor::whole(asset.id, asset.num_frames());
            }
        }
        Self { cursors }
    }

    pub fn trigger(&mut self, index: usize, store: &SampleStore) {
        if !store.is_audio_resident(index) {
            return;
        }
        if let Some(c) = self.cursors.get_mut(index) {
            c.restart();
        }
    }

    pub fn stop(&mut self, index: usize) {
        if let Some(c) = self.cursors.get_mut(index) {
            c.stop();
        }
    }

    pub fn stop_all(&mut self) {
        self.cursors.iter_mut().for_each(PlaybackCursor::stop);
    }

    pub fn is_playing(&self, index: usize) -> bool {
        self.cursors.get(index).is_some_and(|c| !c.is_finished())
    }

    pub fn cursor(&self, index: usize) -> Option<&PlaybackCursor> {
        self.cursors.get(index)
    }

    /// Mixes every playing sample at unity gain and its own speed.
    pub fn mix(&mut self, controls: &Controls, store: &SampleStore, left: &mut [f32], right: &mut [f32]) {
        for (index, cursor) in self.cursors.iter_mut().enumerate() {
            if cursor.is_finished() {
                continue;
            }
            if let Some(pcm) = store.pcm(index) {
                cursor.tick(pcm, controls.sample_speed(index), 1.0, left, right);
            }
        }
    }
}
