//! Error types for the DDNS updater
//!
//! Every failure the updater can hit is one variant of [`Error`]. The
//! variants mirror how the failure must be handled: whether it is retried,
//! whether it aborts the run, or whether it only fails a single target.

use std::fmt;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS updater
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing input; raised before any network call
    #[error("Configuration error: {0}")]
    Config(String),

    /// The public address could not be determined
    #[error("Address detection failed: {0}")]
    Detection(String),

    /// Credential rejected by the provider (401/403); never retried
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// More than one zone or record matched where exactly one was expected
    #[error("Ambiguous match: {0}")]
    Ambiguous(String),

    /// Zone not found at the provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or 5xx; retried with backoff
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Any other 4xx or a rejected request; never retried
    #[error("Request rejected: {0}")]
    Request(String),

    /// Provider answered with a body that could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a detection error
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an ambiguous-match error
    pub fn ambiguous(msg: impl Into<String>) -> Self {
        Self::Ambiguous(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a request error
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Whether the retry policy may attempt the call again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify this error for a per-target outcome
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Config(_) => FailureReason::Config,
            Self::Detection(_) => FailureReason::Detection,
            Self::Authentication(_) => FailureReason::Auth,
            Self::Ambiguous(_) => FailureReason::Ambiguous,
            Self::NotFound(_) => FailureReason::NotFound,
            Self::Transient(_) => FailureReason::Transient,
            Self::Request(_) | Self::Json(_) => FailureReason::Request,
        }
    }
}

/// Why a target failed to reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Config,
    Detection,
    Auth,
    Ambiguous,
    NotFound,
    Transient,
    Request,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Detection => "detection",
            Self::Auth => "auth",
            Self::Ambiguous => "ambiguous",
            Self::NotFound => "not-found",
            Self::Transient => "transient",
            Self::Request => "request",
        };
        f.write_str(name)
    }
}
