use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mav_tools::app::App;
use mav_tools::bus::{MqttBus, Names};
use mav_tools::config::{Config, GeneralConfig};
use mav_tools::telemetry::Telemetry;
use mav_tools::{ingest, ui};

#[derive(Debug, Parser)]
#[command(name = "mav-tools", version, about = "Terminal dashboard for a MAVROS flight controller")]
struct Cli {
    /// Namespace prepended to every topic and service name, e.g. `/uav1`.
    namespace: Option<String>,

    /// Extra configuration file, applied over config/<RUST_ENV>.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(namespace) = cli.namespace {
        config.bus.namespace = namespace;
    }

    setup_logging(&config.general)?;
    info!("Application starting...");
    info!("Namespace: {:?}", config.bus.namespace);

    let names = Names::new(&config.bus.namespace);
    let bus = Arc::new(MqttBus::connect(&config.broker, config.bus.call_timeout()).await?);
    let telemetry = Telemetry::instance();
    ingest::attach(&*bus, &names, telemetry).await?;

    let app = App::new(
        bus.clone(),
        names,
        telemetry,
        config.ui.feedback_delay(),
        config.ui.dark,
    );

    let mut terminal = setup_terminal()?;
    let result = ui::run(&mut terminal, app, config.ui.refresh_period()).await;
    if let Err(e) = restore_terminal(&mut terminal) {
        error!("Failed to restore terminal: {:#}", e);
    }

    bus.disconnect().await;
    info!("Shutting down");
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// The terminal belongs to the dashboard, so logs go to a file.
fn setup_logging(general: &GeneralConfig) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&general.log_file)
        .with_context(|| format!("Failed to open log file {}", general.log_file))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))?
        .add_directive("rumqttc=info".parse()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_thread_names(true) // Show thread names
                .with_target(true) // Show module path
                .with_file(true) // Show file name
                .with_line_number(true), // Show line numbers
        )
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}
