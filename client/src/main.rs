use clap::{Parser, Subcommand};
use client::presenter::present;
use client::render::{render, render_health, render_model_info};
use client::{AnalysisState, Config, HttpTransport, Session, UploadCandidate};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "client", about = "Submit a chest X-ray to the PneumoScan prediction service")]
struct Cli {
    /// Base URL of the prediction service (overrides PNEUMOSCAN_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Request timeout in seconds (overrides PNEUMOSCAN_TIMEOUT_SECS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and analyze a single image
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show what the service reports about its model
    ModelInfo,
    /// Check whether the service is up
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!("Prediction service: {}", config.api_url);

    let transport = match HttpTransport::new(&config) {
        Ok(transport) => transport,
        Err(e) => {
            log::error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Analyze { files } => analyze(transport, &config, files).await,
        Command::ModelInfo => match transport.model_info().await {
            Ok(info) => report_io(render_model_info(&mut io::stdout().lock(), &info)),
            Err(e) => {
                log::error!("Failed to fetch model info: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Health => match transport.health().await {
            Ok(health) => {
                let code = report_io(render_health(&mut io::stdout().lock(), &health));
                if health.is_healthy() { code } else { ExitCode::FAILURE }
            }
            Err(e) => {
                log::error!("Health check failed: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn load_config(cli: &Cli) -> Result<Config, client::config::ConfigError> {
    let mut config = Config::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout_secs(secs);
    }
    Ok(config)
}

async fn analyze(transport: HttpTransport, config: &Config, paths: Vec<PathBuf>) -> ExitCode {
    let mut candidates = Vec::with_capacity(paths.len());
    for path in &paths {
        match UploadCandidate::from_path(path) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let mut session = Session::new(Arc::new(transport), config.limits);
    session.select_files(candidates);
    let state = session.settle().await;

    let code = report_io(render(&mut io::stdout().lock(), &present(state)));
    match state {
        AnalysisState::Succeeded { .. } => code,
        _ => ExitCode::FAILURE,
    }
}

fn report_io(result: io::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Failed to write output: {}", e);
            ExitCode::FAILURE
        }
    }
}
