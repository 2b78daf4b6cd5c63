//! Chunked upload coordinator.
//!
//! One coordinator task owns the [`UploadSession`] and is the only place its
//! partitions change. Chunk tasks run on a [`JoinSet`] whose size is bounded
//! by the admission window; each task uploads one chunk (retrying transient
//! failures in place) and reports a [`ChunkOutcome`] back through the join
//! handle.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use castup_protocol::{CompleteUploadRequest, CompletionResponse, ServerStatus};
use castup_transfer::{
    ByteSource, ChunkPlan, ChunkRange, DiskSource, TransferError, UploadSession, generate_upload_id,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Backoff, UploaderConfig};
use crate::error::{TransportError, UploadError};
use crate::observer::{NoopObserver, UploadObserver};
use crate::transport::{AlwaysOnline, ChunkPayload, Connectivity, UploadTransport};

/// Splits files into chunks and uploads them with bounded concurrency.
///
/// The upload id is generated on first use and kept for the lifetime of the
/// uploader, so calling [`upload`](Self::upload) again after a failure
/// reuses it. Chunk state is reset on every call.
pub struct ChunkedUploader {
    config: UploaderConfig,
    transport: Arc<dyn UploadTransport>,
    connectivity: Arc<dyn Connectivity>,
    observer: Arc<dyn UploadObserver>,
    upload_id: Mutex<Option<String>>,
    cancel: Mutex<CancellationToken>,
}

impl ChunkedUploader {
    /// Creates an uploader with no observer and an always-online probe.
    pub fn new(config: UploaderConfig, transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            config,
            transport,
            connectivity: Arc::new(AlwaysOnline),
            observer: Arc::new(NoopObserver),
            upload_id: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Uses a known upload id instead of generating one.
    pub fn with_upload_id(self, upload_id: impl Into<String>) -> Self {
        *self.upload_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(upload_id.into());
        self
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Returns the upload id, generating it on first call.
    pub fn upload_id(&self) -> String {
        self.upload_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(generate_upload_id)
            .clone()
    }

    /// Opens `path` and uploads it.
    ///
    /// Fails with [`UploadError::NoFile`] before any network activity when the
    /// path does not name a readable regular file.
    pub async fn upload_path(&self, path: &Path) -> Result<CompletionResponse, UploadError> {
        let cancel = self.reset_cancel();
        let open = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || DiskSource::open(&path)
        });
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Aborted),
            joined = open => joined.map_err(|e| UploadError::Task(format!("task join error: {e}")))?,
        };

        match opened {
            Ok(source) => self.finish(self.run(Arc::new(source), cancel).await),
            Err(e) => {
                let err = UploadError::NoFile(format!("{}: {e}", path.display()));
                self.observer.on_error(&err);
                Err(err)
            }
        }
    }

    /// Uploads `file` and asks the server to reassemble it.
    ///
    /// Resolves once the completion request has been answered, or with the
    /// first session-level error. Session errors other than an abort are
    /// also reported to the observer (an abort is reported by
    /// [`abort`](Self::abort) itself).
    pub async fn upload(&self, file: Arc<dyn ByteSource>) -> Result<CompletionResponse, UploadError> {
        let cancel = self.reset_cancel();
        self.finish(self.run(file, cancel).await)
    }

    /// Reports the session outcome to the observer.
    fn finish(
        &self,
        result: Result<CompletionResponse, UploadError>,
    ) -> Result<CompletionResponse, UploadError> {
        match &result {
            Ok(response) => self.observer.on_complete(response),
            Err(UploadError::Aborted) => {}
            Err(e) => self.observer.on_error(e),
        }
        result
    }

    /// Aborts the running upload.
    ///
    /// No further chunk is dispatched, in-flight chunk tasks are dropped and
    /// the pending [`upload`](Self::upload) future resolves to
    /// [`UploadError::Aborted`].
    pub fn abort(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        info!("upload aborted");
        self.observer.on_error(&UploadError::Aborted);
    }

    /// Queries the status endpoint for `upload_id`.
    pub async fn check_status(&self, upload_id: &str) -> Result<ServerStatus, UploadError> {
        check_status(self.transport.as_ref(), upload_id, &self.config.endpoints.status).await
    }

    /// Installs a fresh cancellation token for a new session.
    ///
    /// Called before the first await of a session so an `abort()` issued at
    /// any later point reaches it.
    fn reset_cancel(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    async fn run(
        &self,
        file: Arc<dyn ByteSource>,
        cancel: CancellationToken,
    ) -> Result<CompletionResponse, UploadError> {
        self.config.validate()?;

        let plan = ChunkPlan::new(file.len(), self.config.chunk_size)?;
        let mut session = UploadSession::new(self.upload_id(), plan);
        let total = session.total_chunks();

        info!(
            upload_id = %session.upload_id(),
            file = %file.name(),
            bytes = file.len(),
            chunks = total,
            concurrency = self.config.concurrency,
            "starting chunked upload"
        );

        let ctx = ChunkContext {
            transport: Arc::clone(&self.transport),
            connectivity: Arc::clone(&self.connectivity),
            observer: Arc::clone(&self.observer),
            source: file,
            upload_id: session.upload_id().to_string(),
            total_chunks: total,
            endpoint: self.config.endpoints.chunk_upload.clone(),
            timeout: self.config.request_timeout,
            max_retries: self.config.max_retries,
            backoff: self.config.backoff.clone(),
        };

        let mut workers: JoinSet<ChunkOutcome> = JoinSet::new();
        for _ in 0..self.config.concurrency {
            if !dispatch(&mut session, &mut workers, &ctx, &cancel) {
                break;
            }
        }

        while !session.is_settled() {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    session.cancel();
                    workers.abort_all();
                    debug!(
                        upload_id = %session.upload_id(),
                        status = ?session.status(),
                        completed = session.completed_count(),
                        dropped = session.active_count(),
                        "chunk phase aborted"
                    );
                    return Err(UploadError::Aborted);
                }
                joined = workers.join_next() => joined,
            };

            // Every active chunk has a task, so an empty set means the
            // bookkeeping is broken.
            let Some(joined) = joined else {
                return Err(UploadError::Task(format!(
                    "{} chunks active with no running task",
                    session.active_count()
                )));
            };
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    workers.abort_all();
                    return Err(UploadError::Task(format!("task join error: {e}")));
                }
            };

            match outcome.result {
                Ok(()) => {
                    let progress = session.mark_completed(outcome.index)?;
                    debug!(
                        upload_id = %session.upload_id(),
                        chunk = outcome.index,
                        attempts = outcome.attempts,
                        completed = progress.completed_chunks,
                        total,
                        "chunk uploaded"
                    );
                    self.observer.on_chunk_complete(outcome.index, &progress);
                    self.observer.on_progress(&progress);
                }
                Err(ChunkFailure::Transport(err)) => {
                    session.mark_failed(outcome.index)?;
                    warn!(
                        upload_id = %session.upload_id(),
                        chunk = outcome.index,
                        attempts = outcome.attempts,
                        error = %err,
                        "chunk failed permanently"
                    );
                    self.observer.on_chunk_error(outcome.index, &err);
                }
                Err(ChunkFailure::Source(err)) => {
                    session.fail();
                    workers.abort_all();
                    error!(
                        upload_id = %session.upload_id(),
                        status = ?session.status(),
                        chunk = outcome.index,
                        error = %err,
                        "cannot read chunk"
                    );
                    return Err(err.into());
                }
            }

            dispatch(&mut session, &mut workers, &ctx, &cancel);
        }

        if session.has_failures() {
            session.fail();
            let failed = session.failed();
            error!(
                upload_id = %session.upload_id(),
                status = ?session.status(),
                failed = ?failed,
                total,
                "upload failed"
            );
            return Err(UploadError::ChunksFailed { failed, total });
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                session.cancel();
                debug!(upload_id = %session.upload_id(), status = ?session.status(), "completion aborted");
                return Err(UploadError::Aborted);
            }
            result = complete_upload(self.transport.as_ref(), &self.config.endpoints.complete, &session) => result,
        };

        match response {
            Ok(response) => {
                session.complete();
                info!(
                    upload_id = %session.upload_id(),
                    status = ?session.status(),
                    chunks = total,
                    "upload completed"
                );
                Ok(response)
            }
            Err(e) => {
                session.fail();
                error!(
                    upload_id = %session.upload_id(),
                    status = ?session.status(),
                    error = %e,
                    "upload completion failed"
                );
                Err(e)
            }
        }
    }
}

/// Asks the server to reassemble the chunks of `session`.
///
/// Rejected locally, without contacting the server, unless every chunk of
/// the session has been accepted.
pub async fn complete_upload(
    transport: &dyn UploadTransport,
    endpoint: &str,
    session: &UploadSession,
) -> Result<CompletionResponse, UploadError> {
    if !session.all_completed() {
        return Err(UploadError::Incomplete {
            completed: session.completed_count(),
            total: session.total_chunks(),
        });
    }

    let request = CompleteUploadRequest {
        upload_id: session.upload_id().to_string(),
    };
    let response = transport
        .complete(endpoint, &request)
        .await
        .map_err(UploadError::CompletionFailed)?;

    if let Some(message) = response.error() {
        return Err(UploadError::CompletionRejected(message.to_string()));
    }
    Ok(response)
}

/// Queries the status endpoint. No retry, no session state involved.
pub async fn check_status(
    transport: &dyn UploadTransport,
    upload_id: &str,
    endpoint: &str,
) -> Result<ServerStatus, UploadError> {
    transport
        .status(endpoint, upload_id)
        .await
        .map_err(UploadError::Status)
}

// ---------------------------------------------------------------------------
// Chunk tasks
// ---------------------------------------------------------------------------

/// Everything a chunk task needs, cloned into each task.
#[derive(Clone)]
struct ChunkContext {
    transport: Arc<dyn UploadTransport>,
    connectivity: Arc<dyn Connectivity>,
    observer: Arc<dyn UploadObserver>,
    source: Arc<dyn ByteSource>,
    upload_id: String,
    total_chunks: usize,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
    backoff: Backoff,
}

/// Result of one chunk task, applied to the session by the coordinator.
struct ChunkOutcome {
    index: usize,
    attempts: u32,
    result: Result<(), ChunkFailure>,
}

enum ChunkFailure {
    /// The chunk could not be delivered; permanent for this session.
    Transport(TransportError),
    /// The chunk could not be read from the source.
    Source(TransferError),
}

/// Admits the next pending chunk and spawns its task.
///
/// Returns `false` when nothing was admitted.
fn dispatch(
    session: &mut UploadSession,
    workers: &mut JoinSet<ChunkOutcome>,
    ctx: &ChunkContext,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    let Some(range) = session.admit_next() else {
        return false;
    };
    workers.spawn(upload_chunk_with_retry(ctx.clone(), range));
    true
}

/// Uploads one chunk, retrying transient failures with backoff.
async fn upload_chunk_with_retry(ctx: ChunkContext, range: ChunkRange) -> ChunkOutcome {
    let index = range.index;
    let read = tokio::task::spawn_blocking({
        let source = Arc::clone(&ctx.source);
        move || source.read_range(&range)
    })
    .await;

    let data = match read {
        Ok(Ok(data)) => Bytes::from(data),
        Ok(Err(e)) => return ChunkOutcome::failed(index, 0, ChunkFailure::Source(e)),
        Err(e) => {
            let err = TransferError::Io(std::io::Error::other(format!("task join error: {e}")));
            return ChunkOutcome::failed(index, 0, ChunkFailure::Source(err));
        }
    };

    let payload = ChunkPayload {
        upload_id: ctx.upload_id.clone(),
        filename: ctx.source.name().to_string(),
        chunk_index: index,
        total_chunks: ctx.total_chunks,
        data,
    };

    let mut attempts: u32 = 0;
    let mut retry_count: u32 = 0;
    loop {
        attempts += 1;
        let err = match attempt_chunk(&ctx, payload.clone()).await {
            Ok(()) => {
                return ChunkOutcome {
                    index,
                    attempts,
                    result: Ok(()),
                };
            }
            Err(e) => e,
        };

        if !err.is_retryable() || retry_count >= ctx.max_retries {
            return ChunkOutcome::failed(index, attempts, ChunkFailure::Transport(err));
        }

        let delay = ctx.backoff.delay_for_retry(retry_count);
        warn!(
            upload_id = %ctx.upload_id,
            chunk = index,
            retry = retry_count + 1,
            max_retries = ctx.max_retries,
            delay_ms = delay.as_millis() as u64,
            network = err.is_network(),
            error = %err,
            "retrying chunk"
        );
        ctx.observer.on_chunk_retry(index, retry_count + 1, delay, &err);
        tokio::time::sleep(delay).await;

        // Going offline during the backoff ends the chunk here.
        if !ctx.connectivity.is_online() {
            return ChunkOutcome::failed(index, attempts, ChunkFailure::Transport(TransportError::Offline));
        }
        retry_count += 1;
    }
}

/// One attempt: connectivity check, then the request under the per-request timeout.
async fn attempt_chunk(ctx: &ChunkContext, payload: ChunkPayload) -> Result<(), TransportError> {
    if !ctx.connectivity.is_online() {
        return Err(TransportError::Offline);
    }
    match tokio::time::timeout(ctx.timeout, ctx.transport.upload_chunk(&ctx.endpoint, payload)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

impl ChunkOutcome {
    fn failed(index: usize, attempts: u32, failure: ChunkFailure) -> Self {
        Self {
            index,
            attempts,
            result: Err(failure),
        }
    }
}
