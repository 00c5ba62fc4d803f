//! Coordinator error types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a fetch function can return
#[derive(Debug, Error)]
pub enum FetchError {
    /// Expected, transient failure (network blip, device offline)
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// Credentials were rejected; polling stops until reconfigured
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Anything else; treated as a possible bug
    #[error("Unexpected error: {0}")]
    Unexpected(eyre::Report),
}

impl FetchError {
    /// Create a transient update failure
    pub fn update_failed(reason: impl Into<String>) -> Self {
        Self::UpdateFailed(reason.into())
    }

    /// Create an authentication failure
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed(reason.into())
    }

    /// Wrap an arbitrary error as an unexpected failure
    pub fn unexpected(err: impl Into<eyre::Report>) -> Self {
        Self::Unexpected(err.into())
    }
}

impl From<eyre::Report> for FetchError {
    fn from(err: eyre::Report) -> Self {
        Self::Unexpected(err)
    }
}

/// Classification of a failed refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    UpdateFailed,
    Timeout,
    AuthFailed,
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UpdateFailed => "update-failed",
            FailureKind::Timeout => "timeout",
            FailureKind::AuthFailed => "auth-failed",
            FailureKind::Unexpected => "unexpected",
        }
    }

    /// Whether this kind is expected operational flakiness
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::UpdateFailed | FailureKind::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded detail of the most recent failed refresh
///
/// Cloneable so the same value can be stored as `last_exception` and handed
/// to every caller that awaited the failed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub message: String,

    /// Full diagnostic chain, only captured for unexpected failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub at: DateTime<Utc>,
}

impl FailureInfo {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            at: Utc::now(),
        }
    }

    /// Failure produced when the fetch exceeded its time budget
    pub fn timeout(after: Duration) -> Self {
        Self::new(FailureKind::Timeout, format!("Timeout after {after:?}"))
    }

    /// Failure produced when the fetch future panicked
    pub fn panicked(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            detail: Some(format!("fetch panicked: {message}")),
            ..Self::new(FailureKind::Unexpected, message)
        }
    }
}

impl From<&FetchError> for FailureInfo {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::UpdateFailed(reason) => Self::new(FailureKind::UpdateFailed, reason.clone()),
            FetchError::AuthFailed(reason) => Self::new(FailureKind::AuthFailed, reason.clone()),
            FetchError::Unexpected(report) => Self {
                detail: Some(format!("{report:?}")),
                ..Self::new(FailureKind::Unexpected, report.to_string())
            },
        }
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Errors surfaced through the coordinator handle
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    #[error("Coordinator channel closed")]
    ChannelClosed,

    #[error("Coordinator '{0}' is stopped")]
    Cancelled(String),

    #[error("Coordinator not ready: {0}")]
    NotReady(FailureInfo),

    #[error("Authentication failed: {0}")]
    AuthFailed(FailureInfo),
}
