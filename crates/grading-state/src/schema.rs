//! Schema definitions for grading SurrealDB tables
//!
//! Tables:
//! - submissions: submission content plus its job record (status, attempt
//!   count, checkpoint, result, error)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{
    JobStatus, StatusUpdate, StorageResult, Submission, SubmissionId, SubmissionRecord,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

// ---------------------------------------------------------------------------
// Submission rows
// ---------------------------------------------------------------------------

/// Submission row - content and job record in one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Unique submission ID (UUID string)
    pub submission_id: String,
    /// Topic / prompt context
    pub topic: String,
    /// Text to grade
    pub text: String,
    /// Job status: "PENDING" | "PROCESSING" | "DONE" | "FAILED"
    pub status: String,
    /// Retries scheduled so far
    pub attempt_count: u32,
    /// Sealed checkpoint envelope (JSON)
    #[serde(default)]
    pub checkpoint: Option<serde_json::Value>,
    /// Consolidated result (JSON, set on DONE)
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error detail (set on FAILED)
    #[serde(default)]
    pub error: Option<String>,
    /// Created timestamp
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    /// Last write timestamp
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRow {
    /// Create a new submission row in "PENDING" state
    pub fn new(submission_id: String, topic: String, text: String) -> Self {
        let now = Utc::now();
        SubmissionRow {
            id: None,
            submission_id,
            topic,
            text,
            status: JobStatus::Pending.to_string(),
            attempt_count: 0,
            checkpoint: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn job_status(&self) -> StorageResult<JobStatus> {
        self.status.parse().map_err(|_| StorageError::Corrupt {
            submission_id: self.submission_id.clone(),
            reason: format!("unknown status {:?}", self.status),
        })
    }

    /// Convert into the backend-agnostic record.
    pub fn into_record(self) -> StorageResult<SubmissionRecord> {
        let status = self.job_status()?;
        Ok(SubmissionRecord {
            submission: Submission {
                id: SubmissionId(self.submission_id),
                topic: self.topic,
                text: self.text,
                created_at: self.created_at,
            },
            status,
            attempt_count: self.attempt_count,
            checkpoint: self.checkpoint,
            result: self.result,
            error: self.error,
            updated_at: self.updated_at,
        })
    }
}

/// The fields a single `save_status` call overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: String,
    pub attempt_count: u32,
    pub checkpoint: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<StatusUpdate> for StatusPatch {
    fn from(update: StatusUpdate) -> Self {
        StatusPatch {
            status: update.status.to_string(),
            attempt_count: update.attempt_count,
            checkpoint: update.checkpoint,
            result: update.result,
            error: update.error,
            updated_at: Utc::now(),
        }
    }
}
