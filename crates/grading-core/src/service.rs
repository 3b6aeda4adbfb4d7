//! Submission and status surface.
//!
//! Callers see `PENDING`, `PROCESSING`, `DONE` or `FAILED` and nothing of
//! retries, checkpoints or the committee's intermediate results.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use grading_state::{StatusView, StorageError, StorageResult, SubmissionId, SubmissionStore};

use crate::job::{JobQueue, JobTicket, QueueError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct GradingService {
    store: Arc<dyn SubmissionStore>,
    queue: Arc<dyn JobQueue>,
}

impl GradingService {
    pub fn new(store: Arc<dyn SubmissionStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Store a new submission as `PENDING` and enqueue its first attempt.
    ///
    /// When the queue refuses the ticket the record stays `PENDING`, and a
    /// worker picks it up on recovery.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn submit(&self, topic: &str, text: &str) -> Result<SubmissionId, ServiceError> {
        let id = self.store.create_submission(topic, text).await?;
        self.queue
            .enqueue(JobTicket::first(id.clone()), Duration::ZERO)
            .await?;
        info!(submission_id = %id, "submission accepted");
        Ok(id)
    }

    pub async fn get_status(&self, id: &SubmissionId) -> StorageResult<StatusView> {
        self.store.get_status(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::MemoryJobQueue;
    use grading_state::fakes::MemorySubmissionStore;
    use grading_state::JobStatus;

    #[tokio::test]
    async fn submit_stores_pending_and_enqueues() {
        let store = Arc::new(MemorySubmissionStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let service = GradingService::new(store.clone(), queue.clone());

        let id = service.submit("Topic", "Essay body").await.unwrap();

        let view = service.get_status(&id).await.unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert!(view.result.is_none());
        assert!(view.error.is_none());

        let ticket = queue.next().await.unwrap();
        assert_eq!(ticket, JobTicket::first(id));
    }

    #[tokio::test]
    async fn closed_queue_still_keeps_the_record() {
        let store = Arc::new(MemorySubmissionStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        queue.close();
        let service = GradingService::new(store.clone(), queue);

        let err = service.submit("Topic", "Essay body").await.unwrap_err();
        assert!(matches!(err, ServiceError::Queue(QueueError::Closed)));
        let pending = store.list_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let service = GradingService::new(
            Arc::new(MemorySubmissionStore::new()),
            Arc::new(MemoryJobQueue::new()),
        );
        let err = service
            .get_status(&SubmissionId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SubmissionNotFound { .. }));
    }
}
