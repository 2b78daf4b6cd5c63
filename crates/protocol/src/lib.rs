//! Wire types for the chunked upload HTTP contract.
//!
//! The upload backend exposes three endpoints: one receiving individual
//! chunks as multipart forms, one reassembling a finished upload, and one
//! reporting on an upload by id. This crate holds the request/response
//! shapes and the constants both sides agree on.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{fields, status_message};
pub use messages::{ChunkUploadResponse, CompleteUploadRequest, CompletionResponse, ServerStatus};
pub use types::UploadProgress;
