use crate::shared::Mode;

// state local to the tui; `mode` is synced from DisplayState every frame so
// the same key can mean different things on different pages
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub mode: Mode,
    // gate key is down (press/release pairs when the terminal reports them)
    pub gate_held: bool,
}
