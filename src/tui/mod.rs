mod app;
mod surface;
mod ui;

pub use app::App;
pub use surface::TerminalSurface;

use crate::config::TimelineConfig;
use crate::parser::{LoadedTrace, TraceLoader};
use crate::timeline::TraceSession;
use crate::tree::rows::TraceSummary;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Lines parsed between two looks at the terminal while loading
const LOAD_CHUNK_LINES: usize = 20_000;

/// Open the interactive timeline for the trace at `path`
pub fn run_tui(path: &Path, config: TimelineConfig) -> io::Result<()> {
    init_file_logging()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, path, config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

/// Log to a file only when RUST_LOG is set; stderr belongs to the terminal UI
fn init_file_logging() -> io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        return Ok(());
    }

    let log_dir = dirs::cache_dir()
        .or_else(dirs::state_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("tracetree-tui");
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("tracetree-tui.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // A logger may already be installed when embedded; keep it
    let _ = env_logger::Builder::new()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .parse_default_env()
        .try_init();

    log::info!("Starting tracetree-tui - log file: {}", log_path.display());
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    path: &Path,
    config: TimelineConfig,
) -> io::Result<()> {
    let Some(loaded) = load(terminal, path)? else {
        return Ok(());
    };

    if loaded.tree.is_empty() {
        return Err(io::Error::other(format!(
            "No trace events found in {}",
            path.display()
        )));
    }

    let skipped = loaded.errors.len();
    let summary = TraceSummary::from_tree(&loaded.tree);
    let session = TraceSession::new(Arc::new(loaded.tree), config).map_err(io::Error::other)?;
    let mut app = App::new(
        session,
        summary,
        Some(path.display().to_string()),
        skipped,
    );

    let res = run_app(terminal, &mut app);
    app.session.teardown();
    res
}

/// Parse in chunks, keeping the progress screen responsive.
/// Returns `None` when the user cancels.
fn load(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    path: &Path,
) -> io::Result<Option<LoadedTrace>> {
    let mut loader = TraceLoader::open(path).map_err(io::Error::other)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("trace")
        .to_string();

    loop {
        let done = loader.advance(LOAD_CHUNK_LINES).map_err(io::Error::other)?;
        if done {
            return Ok(Some(loader.finish()));
        }

        let lines_read = loader.lines_read();
        terminal.draw(|f| ui::draw_loading(f, &file_name, lines_read))?;

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && matches!(key.code, KeyCode::Esc | KeyCode::Char('q'))
            {
                loader.cancel();
                return Ok(None);
            }
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        if app.needs_draw() {
            terminal.draw(|f| ui::draw(f, app))?;
            app.frame_drawn();
        }

        // Wait for input, then drain everything queued so a burst of events
        // produces a single frame
        if event::poll(Duration::from_millis(100))? {
            loop {
                handle_event(app, event::read()?);
                if app.should_quit {
                    return Ok(());
                }
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }
    }
}

fn handle_event(app: &mut App, event: Event) {
    match event {
        // Only process key press events, not release
        Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_event(key),
        Event::Mouse(mouse) => app.handle_mouse(mouse),
        Event::Resize(_, _) => app.dirty = true,
        _ => {}
    }
}
