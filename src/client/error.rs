//! Exchange error types

use std::time::Duration;
use thiserror::Error;

/// Exchange error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExchangeError {
    pub kind: ExchangeErrorKind,
    pub message: String,
}

impl ExchangeError {
    pub fn new(kind: ExchangeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::Transport, message)
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::Http, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::MalformedRecord, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ExchangeErrorKind::ServerSignalled, message)
    }

    pub fn premature_termination() -> Self {
        Self::new(
            ExchangeErrorKind::PrematureTermination,
            "stream ended before a terminal event was received",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ExchangeErrorKind::CancelledByUser, "request cancelled")
    }

    pub fn timed_out(after: Duration) -> Self {
        Self::new(
            ExchangeErrorKind::TimedOut,
            format!("no response after {} seconds", after.as_secs()),
        )
    }

    /// Map a reqwest failure onto the taxonomy
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transport(format!("Request timeout: {err}"))
        } else if err.is_connect() {
            Self::transport(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::transport(format!("Failed to decode response: {err}"))
        } else {
            Self::transport(format!("Request failed: {err}"))
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = body.trim();
        let detail = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no details")
                .to_string()
        } else {
            body.to_string()
        };
        match status.as_u16() {
            500..=599 => Self::http(format!("Server error (HTTP {}): {detail}", status.as_u16())),
            _ => Self::http(format!("HTTP error! status: {} ({detail})", status.as_u16())),
        }
    }

    /// Whether this error ends the exchange
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

/// Error classification for the exchange pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeErrorKind {
    /// Network or connection failure before or during a stream
    Transport,
    /// Non-success HTTP status from the service
    Http,
    /// One record failed structural parsing; skipped
    MalformedRecord,
    /// Explicit `error` event from the service
    ServerSignalled,
    /// Transport ended without a terminal event
    PrematureTermination,
    /// Cancelled through the cancel handle
    CancelledByUser,
    /// No response within the configured timeout
    TimedOut,
}

impl ExchangeErrorKind {
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::MalformedRecord)
    }

    /// Cancellation-class kinds share the abort codepath
    pub fn is_abort(self) -> bool {
        matches!(self, Self::CancelledByUser | Self::TimedOut)
    }
}
