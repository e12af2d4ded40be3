mod audio;
mod channel;
mod config;
mod console;
mod countdown;
mod engine;
mod ledger;
mod protocol;
mod registry;
mod screen;
mod screens;
mod server;

use std::{
    fs::OpenOptions,
    io,
    net::SocketAddr,
    panic,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use audio::AudioBackend;
use channel::feedback_channel;
use config::Settings;
use engine::Engine;
use screen::InputEvent;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON settings file; the flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address the command listener binds to [default: 127.0.0.1:1234]
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Frames per second [default: 5]
    #[arg(long)]
    fps: Option<u32>,

    /// Text on the splash screen [default: "Westpark Quiz"]
    #[arg(long)]
    greeting: Option<String>,

    /// Where cues are played [default: silent]
    #[arg(long, value_enum)]
    audio: Option<AudioBackend>,

    /// Log file; the display owns the terminal
    #[arg(long, default_value = "quizboard.log")]
    log_file: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run a line-based operator console against a running display
    Console {
        #[arg(long, default_value = "127.0.0.1:1234")]
        connect: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;

    if let Some(Mode::Console { connect }) = args.mode {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return console::run(connect).await;
    }

    init_file_logging(&args.log_file, filter)?;
    install_panic_hook();
    let settings = load_settings(&args)?;
    info!(settings = %serde_json::to_string(&settings)?, "starting display");

    let (feedback_tx, feedback_rx) = feedback_channel();
    let mut engine = Engine::new(settings.clone(), settings.audio.build(), feedback_tx);
    let listener = server::bind(settings.bind).await?;
    tokio::spawn(server::serve(listener, engine.sender(), feedback_rx));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut engine, settings.frame());

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(%err, "display loop failed");
        println!("{:?}", err)
    }
    info!(teams = engine.ledger().len(), "display stopped");
    Ok(())
}

/// One frame: draw if anything changed, gather terminal input for the rest of
/// the frame, then hand timers, events and queued instructions to the engine.
fn run_app<B: Backend>(terminal: &mut Terminal<B>, engine: &mut Engine, frame: Duration) -> io::Result<()> {
    loop {
        let started = Instant::now();
        if engine.needs_redraw() {
            terminal.draw(|f| engine.render(f))?;
        }

        let mut events = Vec::new();
        while let Some(timeout) = frame.checked_sub(started.elapsed()) {
            if !event::poll(timeout)? {
                break;
            }
            if let Some(event) = InputEvent::from_terminal(event::read()?) {
                events.push(event);
            }
        }

        engine.timer_events(Instant::now());
        engine.handle_events(events);
        engine.check_instructions();

        if engine.should_quit() {
            return Ok(());
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if let Some(greeting) = &args.greeting {
        settings.greeting = greeting.clone();
    }
    if let Some(audio) = args.audio {
        settings.audio = audio;
    }
    Ok(settings)
}

fn init_file_logging(path: &Path, filter: EnvFilter) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Panics would otherwise be printed over the display.
fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        error!(%info, "panic");
    }));
}
