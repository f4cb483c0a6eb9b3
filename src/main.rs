mod action;
mod app;
mod config;
mod connectivity;
mod error;
mod event;
mod navigation;
mod pagination;
mod retry;
mod source;
mod tmdb;
mod tui;
mod types;
mod ui;

use std::fs::File;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::Action;
use crate::app::App;
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::event::Event;
use crate::source::MovieSource;
use crate::tmdb::Tmdb;
use crate::tui::EventHandler;

#[derive(Parser, Debug)]
#[command(name = "marquee", version, about = "Browse, search and review movies from the terminal")]
struct Cli {
    /// TMDB API key (overrides environment and config)
    #[arg(long)]
    api_key: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Start on the search tab with this query
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (file_layer, stderr_layer) = match &cli.log_file {
        Some(path) => {
            let file = File::create(path)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let api_key = config.resolve_api_key(cli.api_key.as_deref())?;

    let connectivity = Connectivity::new();
    let tmdb = Tmdb::new(api_key, &config.tmdb, &config.network, connectivity.clone())?;
    tracing::info!(source = tmdb.name(), "starting");

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let result = run(Arc::new(tmdb), &connectivity, &config, cli.search).await;

    tui::restore()?;

    result
}

async fn run(
    source: Arc<dyn MovieSource>,
    connectivity: &Connectivity,
    config: &Config,
    search: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut terminal = tui::init()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(
        source,
        action_tx.clone(),
        connectivity.subscribe(),
        config.ui.debounce(),
    );
    app.start(search);

    let tick_rate = Duration::from_millis(250);
    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    break;
                }

                match event {
                    Event::Render => {
                        app.on_frame();
                        terminal.draw(|frame| ui::render(frame, &app))?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.teardown();
    Ok(())
}
