//! Configuration read once from the environment.
//!
//! `.env` is loaded by `main` before any of these statics are touched.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Instagram account name.
/// Read from INSTAGRAM_USERNAME environment variable (CLI `--username` wins)
pub static INSTAGRAM_USERNAME: Lazy<Option<String>> = Lazy::new(|| non_empty_var("INSTAGRAM_USERNAME"));

/// Instagram account password.
/// Read from INSTAGRAM_PASSWORD environment variable (CLI `--password` wins)
pub static INSTAGRAM_PASSWORD: Lazy<Option<String>> = Lazy::new(|| non_empty_var("INSTAGRAM_PASSWORD"));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: igrelay.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "igrelay.log".to_string()));

/// Log level for console and file output (error, warn, info, debug, trace)
/// Read from LOG_LEVEL environment variable
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Poll loop timing
pub mod poll {
    use super::Duration;

    /// Pause between two successful cycles (seconds)
    pub const INTERVAL_SECS: u64 = 60;

    /// Pause after a transient (validation) fetch failure (seconds)
    pub const VALIDATION_RETRY_SECS: u64 = 60;

    /// Pause after an unexpected cycle failure (seconds)
    pub const CRITICAL_RETRY_SECS: u64 = 120;

    /// Long pause once a failure tier hits its strike limit, or after a failed relogin (seconds)
    pub const LONG_BACKOFF_SECS: u64 = 300;

    /// Consecutive failures of one kind before the long pause kicks in
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 3;

    /// Threads requested from the inbox per cycle
    pub const THREAD_FETCH_LIMIT: usize = 5;

    /// Threads actually inspected per cycle (most recent first)
    pub const THREADS_PER_CYCLE: usize = 2;

    /// Messages requested per inspected thread
    pub const MESSAGES_PER_THREAD: usize = 3;

    pub fn interval() -> Duration {
        Duration::from_secs(INTERVAL_SECS)
    }

    pub fn validation_retry() -> Duration {
        Duration::from_secs(VALIDATION_RETRY_SECS)
    }

    pub fn critical_retry() -> Duration {
        Duration::from_secs(CRITICAL_RETRY_SECS)
    }

    pub fn long_backoff() -> Duration {
        Duration::from_secs(LONG_BACKOFF_SECS)
    }
}

/// Limits applied to records before they leave the process
pub mod record {
    /// Caption length (characters) in emitted records
    pub const CAPTION_MAX_CHARS: usize = 1000;

    /// Per image URL length (characters) in emitted records
    pub const IMAGE_URL_MAX_CHARS: usize = 400;

    /// Marker appended to any truncated field
    pub const ELLIPSIS: &str = "...";

    /// Largest serialized record accepted by the downstream consumer (bytes)
    pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

    /// Caption / URL length in the reduced fallback record (characters)
    pub const FALLBACK_TEXT_MAX_CHARS: usize = 200;

    /// Placeholder image entries in the reduced fallback record
    pub const FALLBACK_MAX_IMAGES: usize = 3;

    /// Line prefix used by the monitor's stdout protocol
    pub const STDOUT_PREFIX: &str = "CONTENT_EXTRACTED:";
}

/// Session persistence
pub mod session {
    use once_cell::sync::Lazy;
    use std::env;

    /// Directory holding `<account>_session.json` files
    /// Read from SESSION_DIR environment variable
    /// Default: current directory
    pub static SESSION_DIR: Lazy<String> = Lazy::new(|| env::var("SESSION_DIR").unwrap_or_else(|_| ".".to_string()));
}

/// Processed-message bookkeeping
pub mod dedup {
    use once_cell::sync::Lazy;
    use std::env;

    /// Path of the processed message id file
    /// Read from PROCESSED_MESSAGES_PATH environment variable
    /// Default: processed_messages.json
    pub static PROCESSED_MESSAGES_PATH: Lazy<String> = Lazy::new(|| {
        env::var("PROCESSED_MESSAGES_PATH").unwrap_or_else(|_| "processed_messages.json".to_string())
    });

    /// Maximum ids kept (oldest evicted first); 0 keeps everything
    /// Read from PROCESSED_MESSAGES_MAX environment variable
    /// Default: 10000
    pub static MAX_ENTRIES: Lazy<usize> = Lazy::new(|| {
        env::var("PROCESSED_MESSAGES_MAX")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(10_000)
    });
}

/// Instagram transport configuration
pub mod api {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Optional proxy for all Instagram traffic (http://, https:// or socks5://)
    /// Read from INSTAGRAM_PROXY environment variable
    pub static PROXY: Lazy<Option<String>> = Lazy::new(|| {
        env::var("INSTAGRAM_PROXY").ok().and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "none" || trimmed == "disabled" {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    });

    /// GraphQL document id for the web post query (rotates every few weeks)
    /// Read from INSTAGRAM_DOC_ID environment variable
    pub static DOC_ID: Lazy<String> =
        Lazy::new(|| env::var("INSTAGRAM_DOC_ID").unwrap_or_else(|_| "8845758582119845".to_string()));

    /// Maximum post lookups per hour (media info, oEmbed, GraphQL).
    /// Session and inbox polling is paced by the poll interval instead.
    pub const RATE_LIMIT_PER_HOUR: usize = 180;

    /// Request timeout (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Connect timeout (seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 15;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }
}
