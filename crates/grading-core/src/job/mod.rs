//! Resumable grading jobs.
//!
//! - `JobMachine`: runs one attempt of a job, checkpointing each stage
//! - `RetryPolicy`: backoff and retry budget for quota failures
//! - `JobQueue` / `MemoryJobQueue`: delayed delivery of job tickets
//! - `Worker`: pulls tickets, enforces the start interval and re-enqueues retries

pub mod backoff;
pub mod machine;
pub mod queue;
pub mod worker;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use grading_state::{StorageError, SubmissionId};

use crate::domain::{CheckpointError, Checkpoint, ConsolidatedResult};

pub use backoff::RetryPolicy;
pub use machine::{JobConfig, JobMachine};
pub use queue::{JobQueue, MemoryJobQueue};
pub use worker::{Worker, WorkerConfig, WorkerStats};

/// Delivery payload for one job attempt.
///
/// Carries the checkpoint forward so a retried attempt skips completed stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTicket {
    pub submission_id: SubmissionId,
    pub attempt_count: u32,
    #[serde(default)]
    pub checkpoint: Checkpoint,
}

impl JobTicket {
    /// First attempt for a fresh submission.
    pub fn first(submission_id: SubmissionId) -> Self {
        Self {
            submission_id,
            attempt_count: 0,
            checkpoint: Checkpoint::default(),
        }
    }
}

/// What one attempt ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done(Box<ConsolidatedResult>),
    Failed(String),
    /// Quota hit: deliver `ticket` again after `delay`.
    Retry { ticket: JobTicket, delay: Duration },
    /// Nothing to do: the record is terminal or gone.
    Skipped,
}

/// Fatal conditions inside an attempt.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("unreadable checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrector stages incomplete (filled: [{0}])")]
    IncompleteCheckpoint(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}
