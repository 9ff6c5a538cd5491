//! Error handling for vibmon-rs
//!
//! This module defines the error type shared by the telemetry session,
//! the HTTP bridge and the configuration layer, plus a Result alias.
//!
//! Errors fall into a small taxonomy (see [`ErrorKind`]). None of them is
//! fatal to the process: the worker reports them to the UI and keeps any
//! buffered or captured samples intact.

use thiserror::Error;

/// Main error type for vibmon-rs operations
#[derive(Error, Debug)]
pub enum VibMonError {
    /// Connection to the bridge failed or dropped
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound stream message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A call was rejected because it would violate a session invariant
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The bridge or analysis service answered with an error message
    #[error("{0}")]
    Service(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<VibMonError>,
    },
}

/// Coarse classification used by the UI when presenting an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or stream failure; recoverable, no automatic retry
    Transport,
    /// Malformed inbound message; dropped silently
    Decode,
    /// API misuse such as starting a second capture
    Invariant,
    /// Error reported by the remote service, shown verbatim
    Service,
    /// Local configuration, channel or IO failure
    Internal,
}

impl VibMonError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        VibMonError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error, looking through any context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            VibMonError::Transport(_) => ErrorKind::Transport,
            VibMonError::Decode(_) => ErrorKind::Decode,
            VibMonError::Rejected(_) => ErrorKind::Invariant,
            VibMonError::Service(_) => ErrorKind::Service,
            VibMonError::Config(_)
            | VibMonError::Channel(_)
            | VibMonError::Io(_)
            | VibMonError::Serialization(_) => ErrorKind::Internal,
            VibMonError::WithContext { source, .. } => source.kind(),
        }
    }
}

impl From<reqwest::Error> for VibMonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VibMonError::Serialization(err.to_string())
        } else {
            VibMonError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VibMonError {
    fn from(err: serde_json::Error) -> Self {
        VibMonError::Decode(err.to_string())
    }
}

/// Result type alias for vibmon-rs operations
pub type Result<T> = std::result::Result<T, VibMonError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
