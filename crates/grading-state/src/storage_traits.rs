//! Storage trait definitions for the grading engine
//!
//! `SubmissionStore` is the record-store boundary: it owns submissions and the
//! job record attached to each one (status, attempt count, checkpoint, result).
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers and status
// ---------------------------------------------------------------------------

/// Unique identifier for a submission (and the job grading it)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    /// Generate a new random SubmissionId
    pub fn new() -> Self {
        SubmissionId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubmissionId {
    fn from(s: &str) -> Self {
        SubmissionId(s.to_string())
    }
}

/// Lifecycle of a grading job.
///
/// `Pending → Processing → Done | Failed`. A job that is waiting on a
/// rate-limit backoff stays `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Terminal states are user-visible with full detail and never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "DONE" => Ok(JobStatus::Done),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(StorageError::Backend(format!("unknown job status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// The text to grade and its topic. Content fields never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub topic: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// One atomic write to a job record.
///
/// `checkpoint` and `result` are opaque JSON at this layer; the engine owns
/// their typed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub attempt_count: u32,
    pub checkpoint: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl StatusUpdate {
    /// Mark the job as running, carrying the current checkpoint.
    pub fn processing(attempt_count: u32, checkpoint: Option<serde_json::Value>) -> Self {
        Self {
            status: JobStatus::Processing,
            attempt_count,
            checkpoint,
            result: None,
            error: None,
        }
    }

    pub fn done(
        attempt_count: u32,
        checkpoint: Option<serde_json::Value>,
        result: serde_json::Value,
    ) -> Self {
        Self {
            status: JobStatus::Done,
            attempt_count,
            checkpoint,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(
        attempt_count: u32,
        checkpoint: Option<serde_json::Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: JobStatus::Failed,
            attempt_count,
            checkpoint,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Full job record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission: Submission,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub checkpoint: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// The user-visible projection: retries and checkpoints stay hidden.
    pub fn status_view(&self) -> StatusView {
        StatusView {
            submission_id: self.submission.id.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// What the status boundary exposes: `{status, result?, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub submission_id: SubmissionId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// SubmissionStore: record store boundary
// ---------------------------------------------------------------------------

/// Submission and job-record persistence.
///
/// Guarantees:
/// - Every call is atomic; a concurrent `get_status` never observes half of a
///   `save_status`.
/// - A record transitions `Pending → Processing → Done | Failed`.
/// - `Done` and `Failed` records are immutable: further `save_status` calls
///   return `StorageError::InvalidTransition`.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Accept a submission, creating its job record in `Pending`.
    async fn create_submission(&self, topic: &str, text: &str) -> StorageResult<SubmissionId>;

    /// Read the submission content.
    async fn load(&self, id: &SubmissionId) -> StorageResult<Submission>;

    /// Apply one status/checkpoint write.
    async fn save_status(&self, id: &SubmissionId, update: StatusUpdate) -> StorageResult<()>;

    /// Read the full job record.
    async fn get_record(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord>;

    /// Read the user-visible status.
    async fn get_status(&self, id: &SubmissionId) -> StorageResult<StatusView> {
        Ok(self.get_record(id).await?.status_view())
    }

    /// List submissions currently in `status`, oldest first.
    async fn list_by_status(&self, status: JobStatus) -> StorageResult<Vec<SubmissionId>>;
}

/// Check that a record in `from` may accept a write to `to`.
pub fn check_transition(id: &SubmissionId, from: JobStatus, to: JobStatus) -> StorageResult<()> {
    let allowed = match from {
        JobStatus::Pending | JobStatus::Processing => to != JobStatus::Pending,
        JobStatus::Done | JobStatus::Failed => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(StorageError::InvalidTransition {
            submission_id: id.0.clone(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
