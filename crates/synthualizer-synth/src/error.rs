//! Engine construction and context errors.

use thiserror::Error;

/// Failure to create or use the audio context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No audio context could be created (no device, no backend).
    #[error("audio context unavailable: {0}")]
    ContextUnavailable(String),

    /// The context has been closed and no longer renders.
    #[error("audio context is closed")]
    ContextClosed,

    /// Engine or context settings are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The audio backend reported an error while starting.
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidConfig`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
