//! Error types for db-chat.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for db-chat operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Required input is missing or malformed. Rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend answered and explicitly reported a failure.
    ///
    /// The message is backend-authored and shown to the user as-is.
    #[error("{0}")]
    Logical(String),

    /// The backend could not be reached, or its reply could not be read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local state storage failed to read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors (invalid config file, bad API URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a logical (backend-reported) failure with the given message.
    pub fn logical(msg: impl Into<String>) -> Self {
        Self::Logical(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Logical(_) => "Backend Error",
            Self::Transport(_) => "Network Error",
            Self::Persistence(_) => "Storage Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Result type alias using ChatError.
pub type Result<T> = std::result::Result<T, ChatError>;
