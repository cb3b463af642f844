use incentive_harvest::browser::{HtmlSession, HttpLoader};
use incentive_harvest::config::{AppConfig, StorageKind, load_config};
use incentive_harvest::extractor::{OfferExtractor, OpenAiChatClient};
use incentive_harvest::navigator::TraversalOutcome;
use incentive_harvest::scrape_incentives;
use incentive_harvest::storage::{JsonFileStorage, OfferSink, SqliteStorage};

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "incentive-harvest")]
#[command(about = "Harvest dealer incentive offers into structured records")]
struct Cli {
    /// JSON configuration file; defaults apply when it does not exist
    #[arg(default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        info!("No .env file loaded: {}", e);
    }

    let config: AppConfig = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let api_key = match config.llm.api_key() {
        Ok(key) => key,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let client = match OpenAiChatClient::new(&config.llm, api_key) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create completion client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut extractor = OfferExtractor::from_config(Box::new(client), &config.llm);

    let loader = match HttpLoader::new(
        &config.user_agent,
        Duration::from_secs(config.request_timeout_seconds),
    ) {
        Ok(loader) => loader,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut browser = HtmlSession::new(Box::new(loader));

    let report = match scrape_incentives(&mut browser, &mut extractor, &config).await {
        Ok(report) => report,
        Err(e) => {
            error!("Run failed before any offer was collected: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // persist whatever was collected, also after an abort
    if let Err(e) = persist(&config, &report.offers) {
        error!("Failed to save offers: {}", e);
        return ExitCode::FAILURE;
    }

    match report.outcome {
        TraversalOutcome::Done => {
            info!("Harvested {} offers", report.offers.len());
            ExitCode::SUCCESS
        }
        TraversalOutcome::Aborted(e) => {
            warn!("Run aborted with {} offers saved: {}", report.offers.len(), e);
            ExitCode::FAILURE
        }
    }
}

fn persist(
    config: &AppConfig,
    offers: &[incentive_harvest::Offer],
) -> Result<(), incentive_harvest::model::StorageError> {
    let mut sink: Box<dyn OfferSink> = match config.storage {
        StorageKind::Json => Box::new(JsonFileStorage::new(&config.output_path)),
        StorageKind::Sqlite => Box::new(SqliteStorage::new(&config.sqlite_path)?),
    };
    sink.save_all(offers)
}
