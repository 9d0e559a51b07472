//! Error types for docstore-connect
//!
//! Every failure is fatal to the sink run that observes it: the adapter does
//! not retry. Callers that want redelivery re-submit a fresh intent sequence.

use thiserror::Error;

/// Result type alias for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors surfaced by write sinks and storage clients
#[derive(Debug, Error)]
pub enum SinkError {
    /// Configuration validation failed
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/protocol-level failure reported by the storage client
    #[error("transport error: {0}")]
    Transport(String),

    /// The storage client rejected a document, filter, or update as malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// A multi-document operation failed; surfaced as a single failure for
    /// the whole batch, never decomposed per document
    #[error("batch of {size} documents failed: {message}")]
    Batch { size: usize, message: String },

    /// The upstream intent sequence itself failed
    #[error("upstream error: {0}")]
    Upstream(String),

    /// JSON error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a batch failure for `size` documents
    pub fn batch(size: usize, msg: impl Into<String>) -> Self {
        Self::Batch {
            size,
            message: msg.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Check if this error came from the transport layer
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }

    /// Check if the storage client rejected a payload
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if a multi-document operation failed as a whole
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch { .. })
    }
}
