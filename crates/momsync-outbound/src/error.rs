use momsync_core::error::{MomsyncError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("planning system refused the session: {0}")]
    Auth(String),

    #[error("planning system answered HTTP {0}")]
    Status(u16),

    #[error("planning system rejected the import: {}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error("unreadable planning-system response: {0}")]
    InvalidResponse(String),

    #[error("invalid planning-system URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Core(#[from] MomsyncError),

    #[error("background task failed: {0}")]
    Join(String),
}

impl OutboundError {
    /// Failures that warrant a backoff before the next delivery: the
    /// planning system could not be reached or is itself failing.
    pub fn is_transport(&self) -> bool {
        match self {
            OutboundError::Transport(_) => true,
            OutboundError::Status(code) => *code >= 500,
            _ => false,
        }
    }
}
