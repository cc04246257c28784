//! Resident sample storage.
//!
//! The loader fills a [`SampleStore`] once at startup; afterwards it is frozen
//! behind an `Arc` and the audio core only ever borrows PCM by index.

use super::frame::StereoFrame;
use crate::shared::MAX_SAMPLES;

/// Fixed-capacity PCM arena with a monotonically increasing offset.
///
/// Storage is reserved once up front, so appending never reallocates.
/// Nothing is ever freed; a full arena simply refuses further data.
#[derive(Debug)]
pub struct SampleArena {
    frames: Vec<StereoFrame>,
    capacity: usize,
}

/// A sample's slice of the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmRange {
    pub offset: usize,
    pub len: usize,
}

impl SampleArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn allocate(&mut self, data: &[StereoFrame]) -> Option<PcmRange> {
        if data.len() > self.remaining() {
            return None;
        }
        let offset = self.frames.len();
        self.frames.extend_from_slice(data);
        Some(PcmRange {
            offset,
            len: data.len(),
        })
    }

    pub fn used(&self) -> usize {
        self.frames.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.frames.len()
    }

    fn slice(&self, range: PcmRange) -> &[StereoFrame] {
        &self.frames[range.offset..range.offset + range.len]
    }
}

/// Decoded header of one sample file.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleMeta {
    pub name: String,
    pub num_frames: usize,
    pub channels: u16,
    /// Rate of the resident frames, equal to the engine rate once loaded.
    pub sample_rate: u32,
    /// Rate the file was recorded at.
    pub source_rate: u32,
    pub bits_per_sample: u16,
}

#[derive(Clone, Debug)]
pub struct SampleAsset {
    pub id: usize,
    pub meta: SampleMeta,
    /// Metadata is present.
    pub loaded: bool,
    /// PCM is resident in the arena.
    pub audio_ready: bool,
    pcm: Option<PcmRange>,
}

impl SampleAsset {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn num_frames(&self) -> usize {
        self.meta.num_frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.meta.sample_rate
    }

    pub fn pcm_range(&self) -> Option<PcmRange> {
        self.pcm
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sample table is full ({0} samples)")]
    TableFull(usize),
}

#[derive(Debug)]
pub struct SampleStore {
    assets: Vec<SampleAsset>,
    arena: SampleArena,
    max_samples: usize,
}

impl SampleStore {
    pub fn new(arena_frames: usize, max_samples: usize) -> Self {
        let max_samples = max_samples.min(MAX_SAMPLES);
        Self {
            assets: Vec::with_capacity(max_samples),
            arena: SampleArena::with_capacity(arena_frames),
            max_samples,
        }
    }

    /// Registers a sample and copies its frames into the arena.
    ///
    /// If the arena cannot hold the frames the sample is still registered with
    /// its metadata, but `audio_ready` stays false and playback of it is refused.
    pub fn push(&mut self, meta: SampleMeta, frames: &[StereoFrame]) -> Result<usize, StoreError> {
        if self.assets.len() >= self.max_samples {
            return Err(StoreError::TableFull(self.max_samples));
        }
        let id = self.assets.len();
        let pcm = if frames.is_empty() {
            None
        } else {
            self.arena.allocate(frames)
        };
        let meta = SampleMeta {
            num_frames: pcm.map_or(meta.num_frames, |r| r.len),
            ..meta
        };
        self.assets.push(SampleAsset {
            id,
            meta,
            loaded: true,
            audio_ready: pcm.is_some(),
            pcm,
        });
        Ok(id)
    }

    pub fn sample_count(&self) -> usize {
        self.assets.len()
    }

    pub fn get(&self, index: usize) -> Option<&SampleAsset> {
        self.assets.get(index)
    }

    pub fn is_audio_resident(&self, index: usize) -> bool {
        self.get(index).is_some_and(|a| a.audio_ready)
    }

    /// Resident PCM of a sample, or `None` when the index is invalid or not ready.
    pub fn pcm(&self, index: usize) -> Option<&[StereoFrame]> {
        let range = self.get(index)?.pcm?;
        Some(self.arena.slice(range))
    }

    pub fn find_sample(&self, name: &str) -> Option<usize> {
        self.assets.iter().position(|a| a.meta.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleAsset> {
        self.assets.iter()
    }

    pub fn arena(&self) -> &SampleArena {
        &self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, frames: usize) -> SampleMeta {
        SampleMeta {
            name: name.to_string(),
            num_frames: frames,
            channels: 1,
            sample_rate: 48_000,
            source_rate: 48_000,
            bits_per_sample: 16,
        }
    }

    #[test]
    fn test_arena_offsets_are_monotonic() {
        let mut arena = SampleArena::with_capacity(10);
        let a = arena.allocate(&[StereoFrame::mono(0.1); 4]).unwrap();
        let b = arena.allocate(&[StereoFrame::mono(0.2); 3]).unwrap();
        assert_eq!(a, PcmRange { offset: 0, len: 4 });
        assert_eq!(b, PcmRange { offset: 4, len: 3 });
        assert_eq!(arena.remaining(), 3);
        assert!(arena.allocate(&[StereoFrame::zero(); 4]).is_none());
        assert_eq!(arena.used(), 7);
    }

    #[test]
    fn test_store_lookup_is_bounds_checked() {
        let mut store = SampleStore::new(100, MAX_SAMPLES);
        let id = store.push(meta("kick.wav", 2), &[StereoFrame::mono(0.5); 2]).unwrap();
        assert_eq!(id, 0);
        assert_eq!(store.sample_count(), 1);
        assert!(store.get(1).is_none());
        assert!(store.pcm(1).is_none());
        assert!(!store.is_audio_resident(7));
        assert_eq!(store.pcm(0).unwrap().len(), 2);
        assert_eq!(store.find_sample("kick.wav"), Some(0));
        assert_eq!(store.find_sample("snare.wav"), None);
    }

    #[test]
    fn test_sample_that_does_not_fit_is_metadata_only() {
        let mut store = SampleStore::new(3, MAX_SAMPLES);
        store.push(meta("big.wav", 5), &[StereoFrame::zero(); 5]).unwrap();
        let asset = store.get(0).unwrap();
        assert!(asset.loaded);
        assert!(!asset.audio_ready);
        assert_eq!(asset.num_frames(), 5);
        assert!(store.pcm(0).is_none());
        assert!(!store.is_audio_resident(0));
    }

    #[test]
    fn test_table_is_capped() {
        let mut store = SampleStore::new(100, 2);
        store.push(meta("a", 1), &[StereoFrame::zero()]).unwrap();
        store.push(meta("b", 1), &[StereoFrame::zero()]).unwrap();
        assert!(matches!(
            store.push(meta("c", 1), &[StereoFrame::zero()]),
            Err(StoreError::TableFull(2))
        ));
    }
}
