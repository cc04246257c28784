use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grainseq::audio::{self, Engine};
use grainseq::config::Config;
use grainseq::loader;
use grainseq::middle::Middle;
use grainseq::shared::InputEvent;
use grainseq::tui;

const LOG_FILE: &str = "grainseq.log";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

struct Args {
    sample_dir: PathBuf,
    write_config: bool,
}

fn parse_args() -> Args {
    let mut sample_dir = None;
    let mut write_config = false;
    for arg in std::env::args().skip(1) {
        if arg == "--write-config" {
            write_config = true;
        } else {
            sample_dir = Some(PathBuf::from(arg));
        }
    }
    Args {
        sample_dir: sample_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default()),
        write_config,
    }
}

// the terminal belongs to the UI, so logs go to a file (RUST_LOG filters)
fn init_logging(dir: &Path) -> anyhow::Result<()> {
    let path = dir.join(LOG_FILE);
    let file = std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = parse_args();
    init_logging(&std::env::current_dir().unwrap_or_default())?;
    info!(dir = ?args.sample_dir, "starting");

    let config = Config::load(&args.sample_dir)?;
    if args.write_config {
        let path = config.save(&args.sample_dir)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let store = loader::scan_dir(&args.sample_dir, config.sample_rate, config.arena_frames, config.max_samples())
        .context("loading samples")?;
    let (engine, controls) = Engine::build(Arc::new(store), config.engine_settings(), config.command_queue);
    config.apply(&controls);
    let audio = audio::start_audio(engine)?;
    let mut middle = Middle::new(controls);

    terminal::enable_raw_mode()?;
    // Enable keyboard enhancement for real press/release detection.
    // Falls back gracefully if the terminal doesn't support it.
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::PushKeyboardEnhancementFlags(
            crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        let ds = middle.display_state().clone();
        tui_state.mode = ds.mode;

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, blink_on);
        })?;

        for event in tui::input::poll_input(tick_rate, &mut tui_state)? {
            if event == InputEvent::Quit {
                info!(frames = audio.controls().frames_rendered(), "quitting");
                drop(term);
                drop(audio);
                return Ok(());
            }
            middle.handle_input(event);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
