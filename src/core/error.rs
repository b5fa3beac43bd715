use thiserror::Error;

use crate::instagram::{ApiError, LoginError};

/// Centralized error type for the application layer.
///
/// Transport failures arrive as [`ApiError`]; file and JSON failures come from the
/// session and dedup stores. Uses `thiserror` for conversion and display.
///
/// # Example
///
/// ```no_run
/// use igrelay::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Instagram API errors
    #[error("Instagram error: {0}")]
    Api(#[from] ApiError),

    /// Session could not be established
    #[error("Login error: {0}")]
    Login(#[from] LoginError),

    /// IO errors (fs-err keeps the offending path in the message)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Downstream consumer refused or lost a record
    #[error("Delivery error: {0}")]
    Delivery(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
