//! Startup configuration, read from `grainseq.json` next to the samples.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::{Controls, EngineSettings, GrainEnvelope, DEFAULT_BLOCK_SIZE};
use crate::shared::MAX_SAMPLES;

pub const CONFIG_FILE: &str = "grainseq.json";
pub const MAX_BLOCK_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    #[default]
    Fade,
    Hard,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub enabled: bool,
    pub volume: f32,
    pub frequency_hz: f32,
    pub duration_s: f32,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.5,
            frequency_hz: 800.0,
            duration_s: 0.01,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GranularConfig {
    pub spawn_rate: f32,
    pub duration_s: f32,
    pub speed: f32,
    pub position: f32,
    pub envelope: EnvelopeKind,
    pub fade_fraction: f32,
}

impl Default for GranularConfig {
    fn default() -> Self {
        Self {
            spawn_rate: 30.0,
            duration_s: 0.1,
            speed: 1.0,
            position: 0.5,
            envelope: EnvelopeKind::Fade,
            fade_fraction: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sample_rate: u32,
    pub block_size: usize,
    /// Stereo frames reserved for resident PCM.
    pub arena_frames: usize,
    pub max_samples: usize,
    pub initial_bpm: u32,
    pub command_queue: usize,
    pub metronome: MetronomeConfig,
    pub granular: GranularConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: DEFAULT_BLOCK_SIZE,
            arena_frames: 6_291_456, // 48 MiB of f32 stereo
            max_samples: MAX_SAMPLES,
            initial_bpm: 120,
            command_queue: 1024,
            metronome: MetronomeConfig::default(),
            granular: GranularConfig::default(),
        }
    }
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

impl Config {
    /// Reads `<dir>/grainseq.json`, falling back to defaults when it is absent.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = config_path(dir);
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&data).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.clone(), source },
            other => other,
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the config as pretty JSON into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        let path = config_path(dir);
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Rejects values the engine cannot run with. Everything else is clamped
    /// later by the same setters the UI uses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "block_size must be within 1..={MAX_BLOCK_SIZE}, got {}",
                self.block_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        if self.command_queue == 0 {
            return Err(ConfigError::Invalid("command_queue must be positive".into()));
        }
        Ok(())
    }

    pub fn grain_envelope(&self) -> GrainEnvelope {
        match self.granular.envelope {
            EnvelopeKind::Fade => GrainEnvelope::fade(self.granular.fade_fraction),
            EnvelopeKind::Hard => GrainEnvelope::Hard,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            grain_envelope: self.grain_envelope(),
        }
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples.min(MAX_SAMPLES)
    }

    /// Pushes the initial values through the runtime setters.
    pub fn apply(&self, controls: &Controls) {
        controls.set_bpm(self.initial_bpm as f32);

        let m = &self.metronome;
        controls.set_metronome_enabled(m.enabled);
        controls.set_metronome_volume(m.volume);
        controls.set_metronome_frequency(m.frequency_hz);
        controls.set_metronome_duration(m.duration_s);

        let g = &self.granular;
        controls.set_granular_spawn_rate(g.spawn_rate);
        controls.set_granular_duration(g.duration_s);
        controls.set_granular_speed(g.speed);
        controls.set_granular_position(g.position);
    }
}
