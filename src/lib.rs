//! Sampler and step sequencer with a granular voice.
//!
//! The real-time core lives in [`audio`]: one [`audio::Engine`] renders fixed
//! blocks on the output callback and reads everything the UI changes through
//! the shared [`audio::Controls`].

pub mod audio;
pub mod audio_api;
pub mod config;
pub mod loader;
pub mod middle;
pub mod shared;
pub mod tui;

#[cfg(test)]
mod testutil;

pub use audio::{Controls, Engine, EngineSettings, SampleStore};
pub use config::Config;
