//! igrelay - relays Instagram posts shared in direct messages
//!
//! Polls a direct-message inbox, resolves every shared post or reel to its
//! content and hands one normalized [`ContentRecord`] per post to a sink.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors and logging
//! - `instagram`: platform API trait, HTTP client and payload types
//! - `share`: link normalization, share detection and shortcode resolution
//! - `extract`: content extraction cascade and record transport encoding
//! - `session`: session persistence and lifecycle
//! - `watcher`: poll loop, dedup store, backoff and sinks

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod core;
pub mod extract;
pub mod instagram;
pub mod session;
pub mod share;
pub mod watcher;

#[doc(hidden)]
pub mod testing;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use extract::{ContentExtractor, ContentRecord};
pub use instagram::{HttpApi, PlatformApi};
pub use session::{SessionManager, SessionStore};
pub use watcher::DmWatcher;
