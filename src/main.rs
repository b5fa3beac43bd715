use anyhow::{bail, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use igrelay::cli::{Cli, Commands};
use igrelay::core::{config, init_logger, log_startup_configuration};
use igrelay::extract::transport::render_extract;
use igrelay::instagram::PlatformApi;
use igrelay::watcher::{DedupStore, DmWatcher, StdoutSink};
use igrelay::{ContentExtractor, HttpApi, SessionManager, SessionStore};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the subcommand.
///
/// # Errors
/// Returns an error (exit code 1) when credentials are missing, when the
/// logger cannot start, or when `extract` produced nothing.
#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before any config static is read
    let _ = dotenv();

    let cli = Cli::parse_args();
    init_logger(&config::LOG_FILE_PATH)?;

    let credentials = cli.credentials()?;
    log_startup_configuration(&credentials.username);

    let api: Arc<dyn PlatformApi> = Arc::new(HttpApi::new()?);
    let sessions = SessionManager::new(
        api.clone(),
        SessionStore::new(config::session::SESSION_DIR.as_str()),
        credentials,
    );

    match cli.command {
        Commands::Extract { url } => run_extract(api, sessions, &url).await,
        Commands::Monitor => run_monitor(api, sessions).await,
    }
}

/// Single-shot extraction; the record goes to stdout as pretty JSON.
async fn run_extract(api: Arc<dyn PlatformApi>, mut sessions: SessionManager, url: &str) -> Result<()> {
    let extractor = ContentExtractor::new(api);
    let Some(record) = extractor.extract_post_content(&mut sessions, url).await else {
        bail!("Failed to extract content from {}", url);
    };
    println!("{}", render_extract(&record)?);
    Ok(())
}

/// Poll forever; Ctrl+C stops the loop at the next cycle or pause boundary.
async fn run_monitor(api: Arc<dyn PlatformApi>, sessions: SessionManager) -> Result<()> {
    let dedup = DedupStore::load(config::dedup::PROCESSED_MESSAGES_PATH.as_str(), *config::dedup::MAX_ENTRIES).await?;
    let watcher = DmWatcher::new(api, sessions, dedup, Box::new(StdoutSink));

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Shutting down gracefully...");
                shutdown.cancel();
            }
            Err(e) => log::warn!("Cannot listen for Ctrl+C: {}", e),
        }
    });

    watcher.run(token).await?;
    Ok(())
}
