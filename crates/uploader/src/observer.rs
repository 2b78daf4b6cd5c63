//! Optional observers layered on top of the upload future.

use std::time::Duration;

use castup_protocol::{CompletionResponse, UploadProgress};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{TransportError, UploadError};

/// Receives notifications while an upload runs.
///
/// Every method defaults to a no-op. Progress, chunk completion and terminal
/// callbacks are invoked from the coordinator task only, in order; retry
/// notifications come from the chunk task doing the retry.
pub trait UploadObserver: Send + Sync {
    /// A chunk was accepted; called after [`on_chunk_complete`](Self::on_chunk_complete).
    fn on_progress(&self, _progress: &UploadProgress) {}

    fn on_chunk_complete(&self, _index: usize, _progress: &UploadProgress) {}

    /// A chunk will be retried after `delay`. `attempt` is the retry number (1-based).
    fn on_chunk_retry(&self, _index: usize, _attempt: u32, _delay: Duration, _error: &TransportError) {}

    /// A chunk failed permanently.
    fn on_chunk_error(&self, _index: usize, _error: &TransportError) {}

    fn on_complete(&self, _response: &CompletionResponse) {}

    fn on_error(&self, _error: &UploadError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// Upload notification forwarded through a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Progress(UploadProgress),
    ChunkCompleted {
        index: usize,
        progress: UploadProgress,
    },
    ChunkRetry {
        index: usize,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    ChunkFailed {
        index: usize,
        error: String,
    },
    Completed(CompletionResponse),
    Failed {
        error: String,
    },
}

/// Observer that forwards every notification as an [`UploadEvent`].
///
/// Events are dropped (with a warning) when the channel is full or closed;
/// the upload itself never waits on the receiver.
pub struct EventForwarder {
    tx: mpsc::Sender<UploadEvent>,
}

impl EventForwarder {
    /// Creates a forwarder and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UploadEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn forward(&self, event: UploadEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("failed to forward upload event: {e}");
        }
    }
}

impl UploadObserver for EventForwarder {
    fn on_progress(&self, progress: &UploadProgress) {
        self.forward(UploadEvent::Progress(progress.clone()));
    }

    fn on_chunk_complete(&self, index: usize, progress: &UploadProgress) {
        self.forward(UploadEvent::ChunkCompleted {
            index,
            progress: progress.clone(),
        });
    }

    fn on_chunk_retry(&self, index: usize, attempt: u32, delay: Duration, error: &TransportError) {
        self.forward(UploadEvent::ChunkRetry {
            index,
            attempt,
            delay,
            error: error.to_string(),
        });
    }

    fn on_chunk_error(&self, index: usize, error: &TransportError) {
        self.forward(UploadEvent::ChunkFailed {
            index,
            error: error.to_string(),
        });
    }

    fn on_complete(&self, response: &CompletionResponse) {
        self.forward(UploadEvent::Completed(response.clone()));
    }

    fn on_error(&self, error: &UploadError) {
        self.forward(UploadEvent::Failed {
            error: error.to_string(),
        });
    }
}
