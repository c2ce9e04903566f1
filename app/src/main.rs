// In app/src/main.rs

use anyhow::Result;
use api_client::{ApiClient, BotAction, ControlTowerApi};
use app_config::Settings;
use clap::{Parser, Subcommand};
use core_types::{ControlAck, RunId};
use engine::{Synchronizer, ViewState};
use tracing_subscriber::prelude::*;

use self::tracing_layer::{LOG_BUFFER_SIZE, LogBuffer, LogBufferLayer};

mod render;
mod tracing_layer;
mod watch;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Monitor and control the paper-trading bot.")]
struct Cli {
    /// Overrides the configured backend base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Live dashboard: polls the backend and redraws on every change.
    Watch {
        /// The run to select first. Defaults to the latest run.
        #[arg(long)]
        run: Option<String>,
    },

    /// Lists the runs the backend knows about.
    Runs,

    /// Prints the detail and recent time-series of one run.
    Show {
        run_id: String,
    },

    /// Starts the bot.
    Start,

    /// Stops the bot.
    Stop,

    /// Prints whether the bot is running.
    Status,

    /// Runs the backend that serves run artifacts and controls the bot.
    Serve,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut settings = app_config::load_settings()?;
    if let Some(api_url) = &cli.api_url {
        settings.api.base_url = api_url.clone();
        settings.validate()?;
    }

    // The watch screen owns the terminal, so its logs go to a buffer that is
    // drawn under the frame instead of to stderr.
    let log_buffer = LogBuffer::new(LOG_BUFFER_SIZE);
    let targets = log_targets(&settings);
    if matches!(cli.command, Commands::Watch { .. }) {
        tracing_subscriber::registry()
            .with(LogBufferLayer::new(log_buffer.clone()).with_filter(targets))
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(fmt_layer).init();
    }

    tracing::debug!(environment = %settings.app.environment, "Settings loaded.");

    match cli.command {
        Commands::Watch { run } => {
            let initial_run = run.as_deref().map(RunId::parse).transpose()?;
            let api = ApiClient::new(&settings.api)?;
            let sync = Synchronizer::new(api, settings.sync.clone());
            watch::run(sync, log_buffer, &settings.api.base_url, initial_run).await?;
        }
        Commands::Runs => handle_runs(&settings).await?,
        Commands::Show { run_id } => handle_show(&settings, RunId::parse(&run_id)?).await?,
        Commands::Start => handle_control(&settings, BotAction::Start).await?,
        Commands::Stop => handle_control(&settings, BotAction::Stop).await?,
        Commands::Status => handle_status(&settings).await?,
        Commands::Serve => {
            tracing::info!("Starting Control Tower backend");
            web_server::run(settings.server.clone()).await?;
        }
    }

    Ok(())
}

fn log_targets(settings: &Settings) -> tracing_subscriber::filter::Targets {
    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::filter::Targets::new()
        .with_target("hyper", tracing::Level::WARN)
        .with_target("reqwest", tracing::Level::WARN)
        .with_default(level)
}

async fn handle_runs(settings: &Settings) -> Result<()> {
    let api = ApiClient::new(&settings.api)?;
    let runs = api.list_runs().await?;
    if runs.is_empty() {
        println!("{}", render::NO_RUNS);
        return Ok(());
    }
    for run in runs {
        let badge = if run.has_summary { "✅" } else { "⏳" };
        println!("{} {badge}", run.run_id);
    }
    Ok(())
}

async fn handle_show(settings: &Settings, run_id: RunId) -> Result<()> {
    let api = ApiClient::new(&settings.api)?;
    let (runs, status, detail, series) = tokio::try_join!(
        api.list_runs(),
        api.bot_status(),
        api.run_detail(&run_id),
        api.timeseries(&run_id),
    )?;

    // Same frame as the watch screen, built from a single fetch.
    let state = ViewState {
        runs,
        bot_status: Some(status),
        selected_run: Some(run_id),
        detail: Some(detail),
        timeseries: Some(series),
        ..ViewState::default()
    };
    print!("{}", render::render(&state, &[], &settings.api.base_url));
    Ok(())
}

async fn handle_control(settings: &Settings, action: BotAction) -> Result<()> {
    let api = ApiClient::new(&settings.api)?;
    let ack: ControlAck = api.control(action).await?;
    println!("{}", serde_json::to_string_pretty(&ack)?);
    if !ack.ok {
        tracing::warn!(?action, error = ?ack.error, "Backend refused the request.");
    }
    Ok(())
}

async fn handle_status(settings: &Settings) -> Result<()> {
    let api = ApiClient::new(&settings.api)?;
    let status = api.bot_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
