//! Streaming call errors.

use crate::domain::extraction::ExtractionError;
use crate::infrastructure::broadcast::BroadcastError;

/// Terminal error of a streaming call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The broadcaster was closed before the call could register.
    #[error("broadcaster is closed")]
    Closed,

    /// Reading from or writing to the call's stream failed.
    #[error("{0}")]
    Transport(String),

    /// The caller cancelled or the server is shutting down.
    #[error("call cancelled")]
    Cancelled,

    /// The extraction engine rejected a request.
    #[error("not parseable: {0}")]
    Engine(#[from] ExtractionError),

    /// The extraction engine panicked.
    #[error("extraction engine failed: {0}")]
    Internal(String),
}

impl StreamError {
    /// Wrap an inbound stream failure.
    #[must_use]
    pub fn receive(cause: impl std::fmt::Display) -> Self {
        Self::Transport(format!("receive request: {cause}"))
    }

    /// Outbound stream is gone; the response could not be written.
    #[must_use]
    pub fn send_closed() -> Self {
        Self::Transport("send response: outbound stream closed".to_string())
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Transport(_) => "transport_failed",
            Self::Cancelled => "cancelled",
            Self::Engine(_) => "engine_failed",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<BroadcastError> for StreamError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::Closed => Self::Closed,
        }
    }
}
