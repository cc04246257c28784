// Discrete requests from the main loop to the audio callback. Scalar
// parameters travel through the atomics in audio::controls instead; these are
// the events that must act on cursors the audio side owns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    TriggerSample(usize),
    StopSample(usize),
    StopAllSamples,
    SpawnGrain {
        sample: Option<usize>, // None = the configured granular sample
        position: f32,
        duration: f32,
        speed: f32,
    },
}
