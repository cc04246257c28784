use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::audio::{SampleMeta, SampleStore, StereoFrame};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("unsupported format in {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },
}

/// `*.wav` files directly inside `dir`, sorted by file name.
pub fn index_wav_in_dir(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
        })
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

// Decode a WAV into stereo f32 frames, resampled to `target_rate`
pub fn load_wav(path: &Path, target_rate: u32) -> Result<(SampleMeta, Vec<StereoFrame>), LoadError> {
    let decode = |source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = hound::WavReader::open(path).map_err(decode)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(LoadError::Unsupported {
            path: path.to_path_buf(),
            reason: "zero channels".into(),
        });
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode)?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(LoadError::Unsupported {
                    path: path.to_path_buf(),
                    reason: format!("{} bits per sample", spec.bits_per_sample),
                });
            }
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode)?
        }
    };

    // mono is duplicated; beyond stereo only the first two channels are kept
    let mut frames: Vec<StereoFrame> = samples
        .chunks_exact(channels)
        .map(|c| match c {
            [x] => StereoFrame::mono(*x),
            [l, r, ..] => StereoFrame { left: *l, right: *r },
            [] => StereoFrame::zero(),
        })
        .collect();

    if spec.sample_rate != target_rate {
        debug!(path = ?path, from = spec.sample_rate, to = target_rate, "resampling");
        frames = resample_linear(&frames, spec.sample_rate, target_rate);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let meta = SampleMeta {
        name,
        num_frames: frames.len(),
        channels: spec.channels,
        sample_rate: target_rate,
        source_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
    };
    Ok((meta, frames))
}

// Linear interpolation between neighbouring source frames
fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || source_rate == 0 || frames.is_empty() {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).round().max(1.0) as usize;
    let last = frames.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            if idx >= last {
                frames[last]
            } else {
                let frac = (src_pos - idx as f64) as f32;
                frames[idx].lerp(frames[idx + 1], frac)
            }
        })
        .collect()
}

/// Loads every WAV in `dir` into a fresh store at `sample_rate`.
///
/// Files that fail to decode are skipped. A file that no longer fits in the
/// arena is still registered, without resident audio.
pub fn scan_dir(
    dir: &Path,
    sample_rate: u32,
    arena_frames: usize,
    max_samples: usize,
) -> Result<SampleStore, LoadError> {
    let mut store = SampleStore::new(arena_frames, max_samples);
    let paths = index_wav_in_dir(dir)?;
    debug!(dir = ?dir, files = paths.len(), "scanning samples");

    for path in paths {
        let (meta, frames) = match load_wav(&path, sample_rate) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(path = ?path, error = %e, "Skipping sample");
                continue;
            }
        };
        let name = meta.name.clone();
        match store.push(meta, &frames) {
            Ok(id) if store.is_audio_resident(id) => {
                info!(id, name = %name, frames = frames.len(), "Loaded sample");
            }
            Ok(id) => {
                warn!(
                    id,
                    name = %name,
                    remaining = store.arena().remaining(),
                    "Sample arena full, keeping metadata only"
                );
            }
            Err(e) => {
                warn!(error = %e, "Ignoring remaining samples");
                break;
            }
        }
    }

    info!(
        samples = store.sample_count(),
        arena_used = store.arena().used(),
        "Sample scan complete"
    );
    Ok(store)
}
