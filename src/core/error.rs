//! Custom error types for Webpilot
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Webpilot operations
#[derive(Error, Debug)]
pub enum WebpilotError {
    /// Bad caller input - rejected before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network, timeout, or non-2xx failure talking to the automation service
    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    /// Server reports the session inactive or not found
    #[error("Session {session_id} is no longer active (discovered during {operation})")]
    SessionLost {
        session_id: String,
        operation: String,
    },

    /// Command submission rejected while the captcha gate is set
    #[error("Session {session_id} is waiting for manual captcha resolution")]
    CaptchaPending { session_id: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Webpilot operations
pub type Result<T> = std::result::Result<T, WebpilotError>;

impl WebpilotError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transport error tagged with the offending operation
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a session-lost error tagged with the operation that discovered it
    pub fn session_lost(session_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::SessionLost {
            session_id: session_id.into(),
            operation: operation.into(),
        }
    }

    /// Create a captcha-pending error
    pub fn captcha_pending(session_id: impl Into<String>) -> Self {
        Self::CaptchaPending {
            session_id: session_id.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error forces local teardown of session/command state
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionLost { .. })
    }
}
