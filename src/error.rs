//! User-facing error kinds.
//!
//! Every asynchronous boundary (remote call, microphone, clipboard) converts its
//! low-level failure into one of these before it reaches the view layer.

use thiserror::Error;

pub const GENERIC_ORCHESTRATION_FAILURE: &str =
    "Intelligence orchestration failed. The agents encountered an error.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Empty query and similar input problems. Shown inline, never moves the
    /// generation status to Error.
    #[error("{0}")]
    Validation(String),

    /// Network failure, non-2xx status, or a response that does not match the
    /// declared schema.
    #[error("{}", remote_message(.0))]
    RemoteService(String),

    #[error("{0}")]
    DeviceAccess(String),

    #[error("{0}")]
    Clipboard(String),

    /// An intent arrived while the UI should have had it disabled.
    #[error("Another operation is still running")]
    Busy,
}

fn remote_message(message: &str) -> &str {
    if message.trim().is_empty() {
        GENERIC_ORCHESTRATION_FAILURE
    } else {
        message
    }
}

impl AppError {
    pub fn remote(message: impl Into<String>) -> Self {
        AppError::RemoteService(message.into())
    }

    /// Text for the dismissible banner, `None` for errors that stay silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            AppError::Busy => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::RemoteService("The intelligence service timed out. Please try again.".into())
        } else if err.is_decode() {
            AppError::RemoteService(format!("Failed to read the intelligence response: {}", err))
        } else {
            AppError::RemoteService(format!("HTTP request failed: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_remote_message_falls_back_to_generic_text() {
        let err = AppError::remote("   ");
        assert_eq!(err.to_string(), GENERIC_ORCHESTRATION_FAILURE);
    }

    #[test]
    fn remote_message_is_passed_through() {
        let err = AppError::remote("API key not valid. Please pass a valid API key.");
        assert_eq!(
            err.user_message().as_deref(),
            Some("API key not valid. Please pass a valid API key.")
        );
    }

    #[test]
    fn busy_is_silent() {
        assert_eq!(AppError::Busy.user_message(), None);
    }
}
