//! Typed errors for the RAG pipeline.
//!
//! Every fallible core operation returns [`RagError`]. Callers that need to
//! map failures onto another protocol (HTTP status codes, process exit
//! codes) should branch on [`RagError::kind`] rather than on message text.
//!
//! | Kind | Variants | Meaning |
//! |------|----------|---------|
//! | [`ErrorKind::Input`] | `InvalidInput` | Malformed ingestion JSON, empty query |
//! | [`ErrorKind::Backend`] | `BackendUnavailable`, `BackendTimeout`, `BackendResponse` | Embedding or generation service failed |
//! | [`ErrorKind::Consistency`] | `Consistency` | Index and hash file disagree beyond repair |
//! | [`ErrorKind::NotReady`] | `NotReady`, `InitializationFailed` | `ask` before a successful ingestion |
//! | [`ErrorKind::Storage`] | `Storage` | Database or filesystem failure |

use std::fmt;

use thiserror::Error;

/// Which external collaborator a backend error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Embedding,
    Generation,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Embedding => f.write_str("embedding"),
            Backend::Generation => f.write_str("generation"),
        }
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Backend,
    Consistency,
    NotReady,
    Storage,
}

#[derive(Debug, Error)]
pub enum RagError {
    /// Caller-supplied data was rejected before any processing happened.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend could not be reached or answered with a retryable failure.
    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable { backend: Backend, message: String },

    /// The backend did not answer within the configured timeout.
    #[error("{backend} backend timed out after {timeout_secs}s")]
    BackendTimeout { backend: Backend, timeout_secs: u64 },

    /// The backend answered, but with something we cannot use.
    #[error("{backend} backend returned an invalid response: {message}")]
    BackendResponse { backend: Backend, message: String },

    /// Index and processed-hash history disagree and cannot be reconciled.
    #[error("index consistency error: {0} (run with --force-reset to rebuild)")]
    Consistency(String),

    #[error("pipeline not ready: {0}")]
    NotReady(String),

    /// The last ingestion failed; `ask` stays unavailable until a new one succeeds.
    #[error("pipeline initialization failed: {0}")]
    InitializationFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::InvalidInput(_) => ErrorKind::Input,
            RagError::BackendUnavailable { .. }
            | RagError::BackendTimeout { .. }
            | RagError::BackendResponse { .. } => ErrorKind::Backend,
            RagError::Consistency(_) => ErrorKind::Consistency,
            RagError::NotReady(_) | RagError::InitializationFailed(_) => ErrorKind::NotReady,
            RagError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// True for [`RagError::BackendTimeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, RagError::BackendTimeout { .. })
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        RagError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(RagError::InvalidInput("x".into()).kind(), ErrorKind::Input);
        assert_eq!(
            RagError::BackendTimeout {
                backend: Backend::Generation,
                timeout_secs: 5
            }
            .kind(),
            ErrorKind::Backend
        );
        assert_eq!(
            RagError::InitializationFailed("boom".into()).kind(),
            ErrorKind::NotReady
        );
        assert_eq!(RagError::Consistency("x".into()).kind(), ErrorKind::Consistency);
    }

    #[test]
    fn test_backend_message_names_backend() {
        let err = RagError::BackendUnavailable {
            backend: Backend::Embedding,
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "embedding backend unavailable: connection refused"
        );
        assert!(!err.is_timeout());
    }
}
