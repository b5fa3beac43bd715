//! Pause selection for the poll loop.
//!
//! Two independent strike counters: one for transient (validation) fetch
//! failures and one for unexpected cycle failures. Each tier pauses briefly
//! until it reaches its strike limit, then takes one long pause and starts over.

use std::time::Duration;

use crate::core::config;

/// Pause lengths and strike limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Pause after a fully successful cycle
    pub interval: Duration,
    /// Short pause after a transient fetch failure
    pub validation_retry: Duration,
    /// Short pause after an unexpected cycle failure
    pub critical_retry: Duration,
    /// Pause once a tier reaches its strike limit, or after a failed relogin
    pub long_backoff: Duration,
    /// Consecutive failures of one tier before the long pause
    pub max_consecutive_errors: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            interval: config::poll::interval(),
            validation_retry: config::poll::validation_retry(),
            critical_retry: config::poll::critical_retry(),
            long_backoff: config::poll::long_backoff(),
            max_consecutive_errors: config::poll::MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn interval(mut self, pause: Duration) -> Self {
        self.interval = pause;
        self
    }

    #[must_use]
    pub fn validation_retry(mut self, pause: Duration) -> Self {
        self.validation_retry = pause;
        self
    }

    #[must_use]
    pub fn critical_retry(mut self, pause: Duration) -> Self {
        self.critical_retry = pause;
        self
    }

    #[must_use]
    pub fn long_backoff(mut self, pause: Duration) -> Self {
        self.long_backoff = pause;
        self
    }

    /// Strike limit; values below 1 are raised to 1.
    #[must_use]
    pub fn max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max.max(1);
        self
    }
}

/// Consecutive failure counters, reset by a fully successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    pub validation_errors: u32,
    pub critical_errors: u32,
}

impl PollState {
    pub fn record_success(&mut self) {
        self.validation_errors = 0;
        self.critical_errors = 0;
    }

    /// Count a transient fetch failure and return the pause to take.
    pub fn record_validation_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.validation_errors += 1;
        log::warn!(
            "Validation error #{}, continuing without processing threads",
            self.validation_errors
        );
        if self.validation_errors >= policy.max_consecutive_errors {
            log::error!(
                "Too many consecutive validation errors, waiting {}s",
                policy.long_backoff.as_secs()
            );
            self.validation_errors = 0;
            policy.long_backoff
        } else {
            policy.validation_retry
        }
    }

    /// Count an unexpected cycle failure and return the pause to take.
    pub fn record_critical_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.critical_errors += 1;
        if self.critical_errors >= policy.max_consecutive_errors {
            log::error!(
                "Too many consecutive critical errors, waiting {}s",
                policy.long_backoff.as_secs()
            );
            self.critical_errors = 0;
            policy.long_backoff
        } else {
            log::info!("Waiting {}s before retrying", policy.critical_retry.as_secs());
            policy.critical_retry
        }
    }
}
