use std::fs::File;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod fetcher;
mod format;
mod inputter;
mod model;
mod schema;
mod source;
mod table;
mod ui;
mod visibility;

use controller::Controller;
use domain::{DEFAULT_API_URL, JTVError, TVConfig};
use model::{Model, Status};
use source::{DataSource, Request};
use ui::TableUI;

/// A terminal viewer for JSON tables. Columns are taken from whatever fields
/// the API returns.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// API base URL (serving /clients) or path to a JSON file with the same envelope
    #[arg(env = "JTV_API_URL", default_value = DEFAULT_API_URL)]
    source: String,

    /// Table title
    #[arg(long, default_value = "Clients")]
    title: String,

    /// Start with a single client instead of the full list
    #[arg(long)]
    client_id: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Maximum width of a column in characters
    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// How long to wait for terminal events in ms
    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,

    /// Write logs to this file (filter with RUST_LOG)
    #[arg(long)]
    log_file: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("Error: could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(log_file: Option<&str>) -> Result<(), JTVError> {
    // The terminal belongs to the ui, logs only go to a file.
    let file_layer = match log_file {
        Some(path) => {
            let path = shellexpand::full(path)
                .map_err(|e| JTVError::InvalidSource(e.to_string()))?;
            let file = File::create(path.as_ref())?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), JTVError> {
    let config = TVConfig::default()
        .with_title(args.title)
        .with_event_poll_time(args.event_poll_time)
        .with_max_column_width(args.max_column_width)
        .with_request_timeout(Duration::from_secs(args.timeout));
    info!("Starting jtv with {config:?}");

    let source = source::open_source(&args.source, config.request_timeout)?;
    let request = match args.client_id {
        Some(id) => Request::Client(id),
        None => Request::AllClients,
    };

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &config, source, request);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    config: &TVConfig,
    source: Arc<dyn DataSource>,
    request: Request,
) -> Result<(), JTVError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        config,
        source,
        request,
        size.width as usize,
        size.height as usize,
    )?;
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::Quitting {
        // Apply finished fetches and render the current state
        model.update(None)?;
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }

    Ok(())
}
