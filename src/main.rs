use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audiogram::bot::{self, BotCore};
use audiogram::cli::Cli;
use audiogram::config::Config;
use audiogram::delivery::TelegramSink;
use audiogram::fetcher::{YtDlpFetcher, YtDlpOptions};
use audiogram::orchestrator::Orchestrator;
use audiogram::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if cli.verbose {
                    "audiogram=debug".into()
                } else {
                    "audiogram=info".into()
                }
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Credentials and overrides may live in a .env file
    if let Err(e) = dotenvy::from_filename(&cli.env_file) {
        tracing::debug!("No .env file loaded ({}): {}", cli.env_file.display(), e);
    }

    // Check for required external dependencies (non-fatal in Docker)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(staging_dir) = cli.staging_dir {
        config.delivery.staging_dir = staging_dir;
    }
    config.display();

    // The staging area must exist before the first job lands in it
    fs_err::create_dir_all(&config.delivery.staging_dir)
        .context("Failed to create staging directory")?;

    let bot = Bot::new(config.api_token.clone());
    let fetcher = YtDlpFetcher::new(YtDlpOptions::from_config(&config.fetcher));
    let sink = TelegramSink::new(bot.clone(), config.delivery.max_upload_bytes);

    let core: Arc<BotCore> = Arc::new(Orchestrator::new(
        fetcher,
        sink,
        config.delivery.staging_dir.clone(),
        config.delivery.item_delay(),
    ));

    tracing::info!("Starting audiogram bot");
    bot::run(bot, core).await;

    Ok(())
}
