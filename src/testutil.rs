// Fixtures shared by the unit tests.

use std::sync::Arc;

use crate::audio::{SampleMeta, SampleStore, StereoFrame};
use crate::shared::MAX_SAMPLES;

const SAMPLE_RATE: u32 = 48_000;

pub fn constant(frames: usize, value: f32) -> Vec<StereoFrame> {
    vec![StereoFrame::mono(value); frames]
}

pub fn ramp(frames: usize) -> Vec<StereoFrame> {
    (0..frames).map(|i| StereoFrame::mono(i as f32)).collect()
}

/// A store holding each buffer as `sample{i}.wav`, all at 48 kHz.
pub fn store(samples: &[Vec<StereoFrame>]) -> Arc<SampleStore> {
    let total = samples.iter().map(Vec::len).sum();
    let mut store = SampleStore::new(total, MAX_SAMPLES);
    for (i, frames) in samples.iter().enumerate() {
        store
            .push(
                SampleMeta {
                    name: format!("sample{i}.wav"),
                    num_frames: frames.len(),
                    channels: 1,
                    sample_rate: SAMPLE_RATE,
                    source_rate: SAMPLE_RATE,
                    bits_per_sample: 16,
                },
                frames,
            )
            .expect("fixture fits the table");
    }
    Arc::new(store)
}
