//! Error types shared by the render crates.

use thiserror::Error;

/// Errors produced while rendering a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// No fragment registered under the name.
    #[error("Fragment not found: {0}")]
    FragmentNotFound(String),

    /// A fragment reported a failure while rendering.
    #[error("Fragment '{name}' failed: {message}")]
    FragmentFailed { name: String, message: String },

    /// A slot was used incorrectly (missing or foreign future, bad child data).
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    /// Render was called on a session that already rendered.
    #[error("Render session already used")]
    SessionReused,

    /// The delivery queue closed while work was still outstanding.
    #[error("Delivery queue closed with {0} outstanding slot(s)")]
    QueueClosed(usize),

    /// The output sink failed.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl RenderError {
    /// Create a fragment failure with a message.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FragmentFailed {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors from an output sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The receiving side has gone away.
    #[error("Sink closed")]
    Closed,

    /// Writing to the sink failed.
    #[error("Write failed: {0}")]
    Write(String),

    /// The write is not allowed in the sink's current state.
    #[error("Invalid sink state: {0}")]
    InvalidState(&'static str),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Write(err.to_string())
    }
}

/// Errors from resolving a `Resolvable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// `resolve_ok` or `resolve_err` was already called.
    #[error("Value already resolved")]
    AlreadyResolved,
}
