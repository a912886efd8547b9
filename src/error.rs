// src/error.rs

//! Unified error handling for the feed generator.

use std::fmt;

use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Every variant here is run-level: it aborts the feed being built. Problems
/// with a single record never become an `AppError`; they are logged and the
/// record is skipped.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed (connect, timeout or non-2xx status)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Build identifier could not be discovered
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A required key path is missing from an upstream response
    #[error("Missing key path '{path}' in response from {source_url}")]
    MissingPath { path: String, source_url: String },

    /// A required credential is not set in the environment
    #[error("Missing credential: environment variable {0} is not set")]
    Credential(String),

    /// Fetching a source failed for a reason other than transport
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// One or more feeds failed during a multi-feed run
    #[error("{failed} of {total} feed(s) failed")]
    FeedsFailed { failed: usize, total: usize },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a missing key path error.
    pub fn missing_path(path: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self::MissingPath {
            path: path.into(),
            source_url: source_url.into(),
        }
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
