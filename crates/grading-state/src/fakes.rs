//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemorySubmissionStore`, which satisfies the `SubmissionStore`
//! contract without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemorySubmissionStore
// ---------------------------------------------------------------------------

/// In-memory submission store backed by a `HashMap<SubmissionId, SubmissionRecord>`.
///
/// Every trait call holds the lock for its whole duration, which makes each
/// call atomic with respect to concurrent readers.
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    records: Mutex<HashMap<String, SubmissionRecord>>,
    writes: Mutex<Vec<(SubmissionId, StatusUpdate)>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `save_status` call accepted so far, in order.
    pub fn writes(&self) -> Vec<(SubmissionId, StatusUpdate)> {
        self.writes.lock().unwrap().clone()
    }

    fn not_found(id: &SubmissionId) -> StorageError {
        StorageError::SubmissionNotFound {
            submission_id: id.0.clone(),
        }
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn create_submission(&self, topic: &str, text: &str) -> StorageResult<SubmissionId> {
        let id = SubmissionId::new();
        let now = Utc::now();
        let record = SubmissionRecord {
            submission: Submission {
                id: id.clone(),
                topic: topic.to_string(),
                text: text.to_string(),
                created_at: now,
            },
            status: JobStatus::Pending,
            attempt_count: 0,
            checkpoint: None,
            result: None,
            error: None,
            updated_at: now,
        };
        self.records.lock().unwrap().insert(id.0.clone(), record);
        Ok(id)
    }

    async fn load(&self, id: &SubmissionId) -> StorageResult<Submission> {
        let records = self.records.lock().unwrap();
        records
            .get(&id.0)
            .map(|r| r.submission.clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn save_status(&self, id: &SubmissionId, update: StatusUpdate) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id.0).ok_or_else(|| Self::not_found(id))?;
        check_transition(id, record.status, update.status)?;

        record.status = update.status;
        record.attempt_count = update.attempt_count;
        record.checkpoint = update.checkpoint.clone();
        record.result = update.result.clone();
        record.error = update.error.clone();
        record.updated_at = Utc::now();

        self.writes.lock().unwrap().push((id.clone(), update));
        Ok(())
    }

    async fn get_record(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord> {
        let records = self.records.lock().unwrap();
        records.get(&id.0).cloned().ok_or_else(|| Self::not_found(id))
    }

    async fn list_by_status(&self, status: JobStatus) -> StorageResult<Vec<SubmissionId>> {
        let records = self.records.lock().unwrap();
        let mut matching: Vec<&SubmissionRecord> =
            records.values().filter(|r| r.status == status).collect();
        matching.sort_by(|a, b| {
            a.submission
                .created_at
                .cmp(&b.submission.created_at)
                .then_with(|| a.submission.id.cmp(&b.submission.id))
        });
        Ok(matching.into_iter().map(|r| r.submission.id.clone()).collect())
    }
}
