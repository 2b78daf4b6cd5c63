//! Chunk planning and session bookkeeping for chunked uploads.
//!
//! Splits a byte source into fixed-size ranges and tracks which of them are
//! pending, in flight, accepted or permanently failed.

mod id;
mod plan;
mod session;
mod source;

pub use id::generate_upload_id;
pub use plan::{ChunkPlan, ChunkRange};
pub use session::{SessionStatus, UploadSession};
pub use source::{ByteSource, DiskSource, MemorySource};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("chunk {index} is out of range (total {total})")]
    ChunkOutOfRange { index: usize, total: usize },

    #[error("chunk {0} is not in flight")]
    ChunkNotActive(usize),

    #[error("source is not a regular file: {0}")]
    NotAFile(String),
}
