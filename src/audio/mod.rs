use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

mod controls;
mod cursor;
mod engine;
mod frame;
mod grains;
mod metronome;
mod oneshot;
mod sequencer;
mod store;

pub use controls::{AtomicF32, Controls, GranularSettings, Stats, TrackControls};
pub use cursor::PlaybackCursor;
pub use engine::{DEFAULT_BLOCK_SIZE, Engine, EngineSettings};
pub use frame::StereoFrame;
pub use grains::{Grain, GrainEnvelope, GrainPool, SpawnTimer};
pub use metronome::{ClickStage, Metronome};
pub use oneshot::OneShots;
pub use sequencer::{Sequencer, StepClock, TrackVoice, samples_per_step};
pub use store::{PcmRange, SampleArena, SampleAsset, SampleMeta, SampleStore, StoreError};

// frames rendered per pass when the device is not plain stereo
const SCRATCH_FRAMES: usize = 512;

/// Keeps the output stream alive; dropping it stops audio.
pub struct AudioHandle {
    controls: Arc<Controls>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn controls(&self) -> &Arc<Controls> {
        &self.controls
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Opens the default output device at the engine's sample rate and hands the
/// engine to the stream callback.
pub fn start_audio(engine: Engine) -> anyhow::Result<AudioHandle> {
    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        anyhow::bail!("unsupported sample format {:?} (only f32 supported)", supported.sample_format());
    }

    let sample_rate = engine.sample_rate();
    let channels = supported.channels();
    let config = cpal::StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    info!(channels, sample_rate, block_size = engine.block_size(), "opening output stream");

    let controls = engine.controls().clone();
    let output_stream = build_output_stream_f32(&device, &config, engine, channels as usize)?;
    output_stream.play().context("failed to play output stream")?;

    Ok(AudioHandle {
        controls,
        sample_rate,
        _output_stream: output_stream,
    })
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = |err| warn!("audio output stream error: {err}");
    let mut scratch = vec![StereoFrame::zero(); SCRATCH_FRAMES];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info| {
                if channels == 2 {
                    let n_frames = data.len() / 2;
                    // StereoFrame is repr(C) { f32, f32 }, the same layout as one interleaved pair
                    let frames: &mut [StereoFrame] = unsafe {
                        std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut StereoFrame, n_frames)
                    };
                    engine.render_block(frames);
                } else {
                    render_spread(&mut engine, data, channels, &mut scratch);
                }
            },
            err_fn,
            None,
        )
        .context("failed to build output stream")?;

    Ok(stream)
}

/// Renders stereo into `scratch` and spreads it over a device that is not
/// two channels wide: mono gets the average, extra channels stay silent.
fn render_spread(engine: &mut Engine, data: &mut [f32], channels: usize, scratch: &mut [StereoFrame]) {
    let channels = channels.max(1);
    for chunk in data.chunks_mut(channels * scratch.len()) {
        let n = chunk.len() / channels;
        engine.render_block(&mut scratch[..n]);
        for (out, frame) in chunk.chunks_exact_mut(channels).zip(scratch.iter()) {
            out.fill(0.0);
            if channels == 1 {
                out[0] = 0.5 * (frame.left + frame.right);
            } else {
                out[0] = frame.left;
                out[1] = frame.right;
            }
        }
    }
}
