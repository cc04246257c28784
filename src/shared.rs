// Fixed sizes of the device. Everything on the audio path is sized from these,
// so nothing grows while the stream is running.
pub const NUM_STEPS: usize = 16;
pub const NUM_TRACKS: usize = 3;
pub const MAX_SAMPLES: usize = 64;
pub const MAX_GRAINS: usize = 8;

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 180;

// granular parameter ranges; every setter clips into these
pub const SPAWN_RATE_RANGE: (f32, f32) = (1.0, 100.0);
pub const GRAIN_DURATION_RANGE: (f32, f32) = (0.01, 1.0);
pub const GRAIN_SPEED_RANGE: (f32, f32) = (0.1, 4.0);
pub const GRAIN_POSITION_RANGE: (f32, f32) = (0.0, 1.0);

// knob increments and ceilings for the per-spawn randomness amounts
pub const SPAWN_RATE_JITTER_STEP: f32 = 1.0;
pub const DURATION_JITTER_STEP: f32 = 0.01;
pub const SPEED_JITTER_STEP: f32 = 0.1;
pub const POSITION_JITTER_STEP: f32 = 0.01;
pub const SPAWN_RATE_JITTER_MAX: f32 = 50.0;
pub const DURATION_JITTER_MAX: f32 = 0.5;
pub const SPEED_JITTER_MAX: f32 = 2.0;
pub const POSITION_JITTER_MAX: f32 = 0.5;

// Keys, as resolved by tui::input:
//
// Main menu:
//   1             //  EnterSequencer
//   2             //  EnterGranular
//
// Sequencer:
//   1 2 3 4       //  ToggleStep(0..3)
//   q w e r       //  ToggleStep(4..7)
//   a s d f       //  ToggleStep(8..11)
//   z x c v       //  ToggleStep(12..15)
//   Space         //  PlayPress
//   g             //  NextTrack
//   h             //  NextTrackSample
//   u             //  ToggleMute
//   k             //  ToggleMetronome
//   0             //  ResetSequencer
//   [ / ]         //  AdjustBpm(-1 or 1)
//   - / =         //  AdjustTrackVolume(-0.05 or 0.05)
//
// Granular:
//   b / B         //  GateOpen / GateClose (lowercase = down, shifted = up)
//   p             //  NextGranularParam
//   h             //  NextGranularSample
//   [ / ]         //  AdjustGranularParam(-1 or 1 knob steps)
//   - / =         //  AdjustGranularJitter(-1 or 1 knob steps)
//   grid keys     //  TriggerPad(0..15), one-shot preview of that sample
//   Space         //  StopPad, silences every one-shot
//
// Anywhere:
//   m             //  MainMenu
//   Esc           //  Quit

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    #[default]
    MainMenu = 0,
    Sequencer = 1,
    Granular = 2,
}

impl Mode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Mode::Sequencer,
            2 => Mode::Granular,
            _ => Mode::MainMenu,
        }
    }

    // only these two modes produce audio
    pub fn is_audible(self) -> bool {
        self != Mode::MainMenu
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GranularParam {
    #[default]
    SpawnRate,
    Duration,
    Speed,
    Position,
}

impl GranularParam {
    pub fn next(self) -> Self {
        match self {
            GranularParam::SpawnRate => GranularParam::Duration,
            GranularParam::Duration => GranularParam::Speed,
            GranularParam::Speed => GranularParam::Position,
            GranularParam::Position => GranularParam::SpawnRate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GranularParam::SpawnRate => "RATE",
            GranularParam::Duration => "DUR",
            GranularParam::Speed => "SPEED",
            GranularParam::Position => "POS",
        }
    }

    // (value knob step, jitter knob step)
    pub fn knob_steps(self) -> (f32, f32) {
        match self {
            GranularParam::SpawnRate => (1.0, SPAWN_RATE_JITTER_STEP),
            GranularParam::Duration => (0.01, DURATION_JITTER_STEP),
            GranularParam::Speed => (0.1, SPEED_JITTER_STEP),
            GranularParam::Position => (0.01, POSITION_JITTER_STEP),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Quit,
    MainMenu,
    EnterSequencer,
    EnterGranular,

    // sequencer page
    PlayPress,
    ToggleStep(u8),
    NextTrack,
    NextTrackSample,
    ToggleMute,
    ToggleMetronome,
    ResetSequencer,
    AdjustBpm(i32),
    AdjustTrackVolume(f32),

    // granular page
    GateOpen,
    GateClose,
    NextGranularParam,
    NextGranularSample,
    AdjustGranularParam(i32),
    AdjustGranularJitter(i32),
    TriggerPad(u8),
    StopPad,
}

// everything the terminal view needs for one frame; built by middle.rs
#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub mode: Mode,
    pub status: String,

    // sequencer page
    pub bpm: u32,
    pub running: bool,
    pub current_step: u8,
    pub selected_track: u8,
    pub tracks: [TrackView; NUM_TRACKS],
    pub metronome: bool,

    // granular page
    pub gate_open: bool,
    pub granular_sample: String,
    pub selected_param: GranularParam,
    pub params: [(GranularParam, f32, f32); 4], // (param, value, jitter)
    pub active_grains: u32,
    pub spawn_successes: u32,
    pub spawn_failures: u32,

    pub sample_count: usize,
}

#[derive(Clone, Debug, Default)]
pub struct TrackView {
    pub sample_name: Option<String>,
    pub steps: [bool; NUM_STEPS],
    pub mute: bool,
    pub volume: f32,
    pub triggers: u32,
}
