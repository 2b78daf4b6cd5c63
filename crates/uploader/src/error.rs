//! Upload error types.

use castup_protocol::status_message;
use castup_transfer::TransferError;

/// Failure of a single request to the upload backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no network connection")]
    Offline,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Builds the error for a non-2xx response.
    pub fn from_status(status: u16) -> Self {
        Self::Status {
            status,
            message: status_message(status).into_owned(),
        }
    }

    /// Network-class failures: offline, transport failure or timeout.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Offline | Self::Network(_) | Self::Timeout)
    }

    /// Network-class and 5xx failures are worth another attempt; everything
    /// else would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => (500..600).contains(status),
            other => other.is_network(),
        }
    }
}

/// Errors surfaced by an upload session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no file provided: {0}")]
    NoFile(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("upload failed: {} of {total} chunks could not be uploaded", .failed.len())]
    ChunksFailed { failed: Vec<usize>, total: usize },

    #[error("cannot complete upload: {completed}/{total} chunks completed")]
    Incomplete { completed: usize, total: usize },

    #[error("completion rejected: {0}")]
    CompletionRejected(String),

    #[error("completion failed: {0}")]
    CompletionFailed(TransportError),

    #[error("status check failed: {0}")]
    Status(TransportError),

    #[error("chunk task failed: {0}")]
    Task(String),

    #[error("upload aborted")]
    Aborted,
}

impl UploadError {
    /// Indices of permanently failed chunks, if this is an aggregate failure.
    pub fn failed_chunks(&self) -> &[usize] {
        match self {
            Self::ChunksFailed { failed, .. } => failed.as_slice(),
            _ => &[],
        }
    }
}
