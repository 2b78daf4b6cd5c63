//! Transport seam between the coordinator and the upload backend.
//!
//! [`HttpTransport`](crate::HttpTransport) is the production implementation.
//! Keeping the coordinator behind a trait makes retry and admission logic
//! testable with in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use castup_protocol::{CompleteUploadRequest, CompletionResponse, ServerStatus};

use crate::error::TransportError;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// One chunk attempt as sent to the chunk endpoint.
///
/// Cloning is cheap: retries of the same chunk share one buffer.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub upload_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub data: Bytes,
}

/// Abstract connection to the upload backend.
pub trait UploadTransport: Send + Sync {
    /// Posts one chunk. Resolves to `Ok(())` only when the server accepted it.
    fn upload_chunk<'a>(&'a self, endpoint: &'a str, chunk: ChunkPayload) -> TransportFuture<'a, ()>;

    /// Asks the server to reassemble the upload.
    ///
    /// A 2xx body is returned as-is, including one carrying an `error` field.
    fn complete<'a>(
        &'a self,
        endpoint: &'a str,
        request: &'a CompleteUploadRequest,
    ) -> TransportFuture<'a, CompletionResponse>;

    /// Queries the server about an upload.
    fn status<'a>(&'a self, endpoint: &'a str, upload_id: &'a str) -> TransportFuture<'a, ServerStatus>;
}

/// Reports whether the host currently has network connectivity.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity probe that never reports the host as offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}
