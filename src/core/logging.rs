//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (stderr + file)
//! - Level parsing from `LOG_LEVEL`
//!
//! The terminal logger writes to stderr only: stdout is reserved for emitted records.

use anyhow::Result;
use simplelog::*;

use crate::core::config;

/// Parse a textual level (`error`, `warn`, `info`, `debug`, `trace`, `off`).
///
/// Unknown values fall back to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initialize logger for both stderr and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file (appended to, created if missing)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to open the file or a logger is already installed
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let level = parse_level(&config::LOG_LEVEL);
    let log_file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    let term_config = ConfigBuilder::new().set_target_level(LevelFilter::Error).build();

    CombinedLogger::init(vec![
        TermLogger::new(level, term_config, TerminalMode::Stderr, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup (never the password).
pub fn log_startup_configuration(account: &str) {
    log::info!("igrelay {} starting", env!("CARGO_PKG_VERSION"));
    log::info!("  account: {}", account);
    log::info!("  session dir: {}", config::session::SESSION_DIR.as_str());
    log::info!(
        "  processed ids: {} (max {})",
        config::dedup::PROCESSED_MESSAGES_PATH.as_str(),
        *config::dedup::MAX_ENTRIES
    );
    match config::api::PROXY.as_deref() {
        Some(proxy) => log::info!("  proxy: {}", proxy),
        None => log::info!("  proxy: none"),
    }
    log::info!(
        "  poll: every {}s, {} thread(s) x {} message(s)",
        config::poll::INTERVAL_SECS,
        config::poll::THREADS_PER_CYCLE,
        config::poll::MESSAGES_PER_THREAD
    );
}
