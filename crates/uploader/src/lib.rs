//! Chunked upload coordinator.
//!
//! Splits a file into fixed-size chunks, uploads them with bounded
//! concurrency and per-chunk retry, and asks the backend to reassemble the
//! file once every chunk has been accepted.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use castup_uploader::{ChunkedUploader, HttpTransport, UploaderConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new("https://media.example.com")?);
//! let uploader = ChunkedUploader::new(UploaderConfig::default(), transport);
//! let response = uploader.upload_path(Path::new("episode.mp3")).await?;
//! println!("{:?}", response.get("path"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod observer;
pub mod transport;
pub mod uploader;

pub use config::{Backoff, Endpoints, UploaderConfig};
pub use error::{TransportError, UploadError};
pub use http::HttpTransport;
pub use observer::{EventForwarder, NoopObserver, UploadEvent, UploadObserver};
pub use transport::{AlwaysOnline, ChunkPayload, Connectivity, TransportFuture, UploadTransport};
pub use uploader::{ChunkedUploader, check_status, complete_upload};
