//! Error handling for the application

use thiserror::Error;

/// Fetch-related errors. Every variant maps to a stable `code()` that is
/// stored on the item as `last_error_code` and keys the error-notification
/// cooldown.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Request blocked by anti-bot protection")]
    Blocked,

    #[error("Failed to parse product page: {0}")]
    ParseFailed(String),

    #[error("Request timed out")]
    Timeout,
}

impl SourceError {
    pub fn code(&self) -> &'static str {
        match self {
            SourceError::Http(_) => "http",
            SourceError::Status(_) => "status",
            SourceError::Blocked => "blocked",
            SourceError::ParseFailed(_) => "parse_failed",
            SourceError::Timeout => "timeout",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if let Some(status) = err.status() {
            SourceError::Status(status.as_u16())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Notification API returned status {0}")]
    Api(u16),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Unknown(err.to_string())
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        AppError::Unknown(err.to_string())
    }
}
