use std::collections::{BTreeSet, VecDeque};

use castup_protocol::UploadProgress;

use crate::TransferError;
use crate::plan::{ChunkPlan, ChunkRange};

/// Lifecycle of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Chunk bookkeeping for one upload attempt.
///
/// Every chunk index lives in exactly one of four partitions: pending,
/// active (in flight), completed or failed. The session is owned by a single
/// coordinator task; workers never touch it directly.
#[derive(Debug)]
pub struct UploadSession {
    upload_id: String,
    plan: ChunkPlan,
    status: SessionStatus,
    pending: VecDeque<usize>,
    active: BTreeSet<usize>,
    /// Accepted chunks in acceptance order.
    completed: Vec<usize>,
    failed: BTreeSet<usize>,
}

impl UploadSession {
    /// Creates a pending session with every chunk queued in index order.
    pub fn new(upload_id: impl Into<String>, plan: ChunkPlan) -> Self {
        Self {
            upload_id: upload_id.into(),
            plan,
            status: SessionStatus::Pending,
            pending: (0..plan.total_chunks()).collect(),
            active: BTreeSet::new(),
            completed: Vec::with_capacity(plan.total_chunks()),
            failed: BTreeSet::new(),
        }
    }

    /// Moves the next pending chunk into the active set.
    ///
    /// Returns `None` when the queue is drained or the session has been
    /// cancelled.
    pub fn admit_next(&mut self) -> Option<ChunkRange> {
        if self.status == SessionStatus::Cancelled {
            return None;
        }
        let index = self.pending.pop_front()?;
        let range = self.plan.range(index)?;
        self.active.insert(index);
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::InProgress;
        }
        Some(range)
    }

    /// Records that an active chunk was accepted by the server.
    pub fn mark_completed(&mut self, index: usize) -> Result<UploadProgress, TransferError> {
        self.take_active(index)?;
        self.completed.push(index);
        Ok(self.progress())
    }

    /// Records that an active chunk failed permanently.
    pub fn mark_failed(&mut self, index: usize) -> Result<(), TransferError> {
        self.take_active(index)?;
        self.failed.insert(index);
        Ok(())
    }

    fn take_active(&mut self, index: usize) -> Result<(), TransferError> {
        if index >= self.plan.total_chunks() {
            return Err(TransferError::ChunkOutOfRange {
                index,
                total: self.plan.total_chunks(),
            });
        }
        if !self.active.remove(&index) {
            return Err(TransferError::ChunkNotActive(index));
        }
        Ok(())
    }

    /// Returns `true` once nothing is queued and nothing is in flight.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// Returns `true` when every chunk has been accepted.
    pub fn all_completed(&self) -> bool {
        self.completed.len() == self.plan.total_chunks()
    }

    /// Marks the session as completed.
    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
    }

    /// Marks the session as failed.
    pub fn fail(&mut self) {
        self.status = SessionStatus::Failed;
    }

    /// Marks the session as cancelled; no further chunk is admitted.
    pub fn cancel(&mut self) {
        self.status = SessionStatus::Cancelled;
    }

    /// Current chunk-level progress.
    pub fn progress(&self) -> UploadProgress {
        UploadProgress::new(
            self.upload_id.clone(),
            self.completed.len(),
            self.plan.total_chunks(),
        )
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn total_chunks(&self) -> usize {
        self.plan.total_chunks()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Accepted chunk indices in acceptance order.
    pub fn completed(&self) -> &[usize] {
        &self.completed
    }

    /// Permanently failed chunk indices, ascending.
    pub fn failed(&self) -> Vec<usize> {
        self.failed.iter().copied().collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
