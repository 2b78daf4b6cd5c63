use std::borrow::Cow;
use std::time::Duration;

/// Default chunk size: 10 MiB.
///
/// Keeps every request well below the 100 MB body limit enforced by the
/// proxy in front of the upload backend.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of chunk uploads allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default per-chunk retry ceiling.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Timeout for a single chunk request.
pub const CHUNK_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the first retry of a chunk.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound for the retry backoff.
pub const RETRY_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Default chunk endpoint path.
pub const CHUNK_UPLOAD_PATH: &str = "/api/upload/chunk";

/// Default completion endpoint path.
pub const COMPLETE_PATH: &str = "/api/upload/complete";

/// Default status endpoint path.
pub const STATUS_PATH: &str = "/api/upload/status";

/// Multipart form field names for the chunk endpoint.
pub mod fields {
    /// Binary chunk body, sent with the original file name.
    pub const FILE: &str = "file";
    pub const FILENAME: &str = "filename";
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const UPLOAD_ID: &str = "uploadId";
}

/// Query parameter carrying the upload id on the status endpoint.
pub const STATUS_QUERY_PARAM: &str = "uploadId";

/// Returns the user-facing message for a non-2xx chunk response.
pub fn status_message(status: u16) -> Cow<'static, str> {
    match status {
        400 => Cow::Borrowed("bad request"),
        401 => Cow::Borrowed("authorization required"),
        403 => Cow::Borrowed("access denied"),
        404 => Cow::Borrowed("upload API not found"),
        413 => Cow::Borrowed("chunk too large"),
        500 => Cow::Borrowed("server error"),
        503 => Cow::Borrowed("service unavailable"),
        other => Cow::Owned(format!("HTTP error {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_have_specific_messages() {
        assert_eq!(status_message(401), "authorization required");
        assert_eq!(status_message(413), "chunk too large");
        assert_eq!(status_message(503), "service unavailable");
    }

    #[test]
    fn unknown_status_uses_generic_message() {
        assert_eq!(status_message(418), "HTTP error 418");
        assert_eq!(status_message(502), "HTTP error 502");
    }

    #[test]
    fn backoff_bounds_are_ordered() {
        assert!(RETRY_BASE_DELAY < RETRY_MAX_DELAY);
    }
}
