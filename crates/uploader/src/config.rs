//! Uploader configuration.
//!
//! Every field has a default, so an empty TOML table is a valid config.
//! Durations are written in milliseconds.

use std::time::Duration;

use castup_protocol::constants::{
    CHUNK_REQUEST_TIMEOUT, CHUNK_UPLOAD_PATH, COMPLETE_PATH, DEFAULT_CHUNK_SIZE,
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, RETRY_BASE_DELAY, RETRY_MAX_DELAY, STATUS_PATH,
};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Options recognized by [`ChunkedUploader`](crate::ChunkedUploader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Bytes per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Retries allowed per chunk after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum chunk uploads in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Client-side timeout for each chunk request.
    #[serde(
        rename = "request_timeout_ms",
        default = "default_request_timeout",
        with = "duration_ms"
    )]
    pub request_timeout: Duration,

    #[serde(default)]
    pub backoff: Backoff,

    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_request_timeout() -> Duration {
    CHUNK_REQUEST_TIMEOUT
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            concurrency: default_concurrency(),
            request_timeout: default_request_timeout(),
            backoff: Backoff::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl UploaderConfig {
    /// Rejects values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(UploadError::InvalidConfig(
                "concurrency must be greater than zero".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(UploadError::InvalidConfig(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Exponential backoff between attempts of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay before the first retry.
    #[serde(rename = "initial_delay_ms", default = "default_initial_delay", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Backoff cap.
    #[serde(rename = "max_delay_ms", default = "default_max_delay", with = "duration_ms")]
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_initial_delay() -> Duration {
    RETRY_BASE_DELAY
}

fn default_max_delay() -> Duration {
    RETRY_MAX_DELAY
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry_count + 1` (0-based count of retries
    /// already made): `min(initial × factor^retry_count, max)`.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let exp = retry_count.min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Paths (or absolute URLs) of the three backend endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_chunk_upload")]
    pub chunk_upload: String,
    #[serde(default = "default_complete")]
    pub complete: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_chunk_upload() -> String {
    CHUNK_UPLOAD_PATH.into()
}

fn default_complete() -> String {
    COMPLETE_PATH.into()
}

fn default_status() -> String {
    STATUS_PATH.into()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            chunk_upload: default_chunk_upload(),
            complete: default_complete(),
            status: default_status(),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
