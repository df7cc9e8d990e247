//! Error types for reviewforge.
//!
//! Library crates use [`ReviewForgeError`] and [`RunError`] via `thiserror`.
//! The CLI wraps these with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::Phase;

/// General error type for configuration, I/O, and collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum ReviewForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a remote service.
    #[error("network error: {0}")]
    Network(String),

    /// Structured payload could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// An external collaborator reported a failure.
    #[error("collaborator error: {0}")]
    Collaborator(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReviewForgeError>;

impl ReviewForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

/// Terminal failure of a pipeline run.
///
/// Every variant is attributable to a [`Phase`]; partial run state is
/// discarded when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The request was rejected before any collaborator was called.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// A collaborator call exceeded its deadline.
    #[error("{phase}: collaborator timed out after {timeout:?}")]
    CollaboratorTimeout { phase: Phase, timeout: Duration },

    /// A collaborator call failed with no local fallback.
    #[error("{phase}: collaborator failed: {source}")]
    CollaboratorError {
        phase: Phase,
        #[source]
        source: ReviewForgeError,
    },

    /// Discovery produced nothing to analyze.
    #[error("discovering: no content found")]
    NoContentFound,

    /// Every analysis was tombstoned, so there is nothing to synthesize.
    #[error("synthesizing: no successful analyses to synthesize")]
    SynthesisInputEmpty,

    /// The caller cancelled the run.
    #[error("{phase}: run cancelled")]
    Cancelled { phase: Phase },
}

impl RunError {
    /// Create an invalid-request error from any displayable message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    /// The phase the run was in when it failed.
    pub fn phase(&self) -> Phase {
        match self {
            Self::InvalidRequest { .. } => Phase::Idle,
            Self::CollaboratorTimeout { phase, .. }
            | Self::CollaboratorError { phase, .. }
            | Self::Cancelled { phase } => *phase,
            Self::NoContentFound => Phase::Discovering,
            Self::SynthesisInputEmpty => Phase::Synthesizing,
        }
    }
}
