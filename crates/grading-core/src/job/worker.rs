//! Queue consumer: starts job attempts at a bounded rate and re-delivers retries.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use grading_state::{JobStatus, StatusUpdate, StorageError, SubmissionId};

use crate::config::duration_secs;
use crate::domain::Checkpoint;
use crate::job::{JobMachine, JobOutcome, JobQueue, JobTicket, QueueError};
use crate::metrics::METRICS;
use crate::obs::JobSpan;

/// How long a ticket for an already running job waits before redelivery.
const DUPLICATE_DEFER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Minimum spacing between two job starts.
    #[serde(with = "duration_secs", rename = "job_start_interval_secs")]
    pub job_start_interval: Duration,
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_start_interval: Duration::from_secs(60),
            max_concurrent_jobs: 1,
        }
    }
}

/// Counters for one [`Worker::run`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

type Finished = (JobTicket, Result<Result<JobOutcome, StorageError>, JoinError>);

pub struct Worker {
    machine: Arc<JobMachine>,
    queue: Arc<dyn JobQueue>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(machine: Arc<JobMachine>, queue: Arc<dyn JobQueue>, config: WorkerConfig) -> Self {
        Self {
            machine,
            queue,
            config,
        }
    }

    /// Enqueue every job left unfinished by a previous process.
    ///
    /// `PROCESSING` jobs resume from their stored checkpoint and attempt
    /// count. Returns the number of tickets enqueued.
    pub async fn recover(&self) -> Result<usize, WorkerError> {
        let store = self.machine.store();
        let mut enqueued = 0;

        for id in store.list_by_status(JobStatus::Pending).await? {
            self.queue.enqueue(JobTicket::first(id), Duration::ZERO).await?;
            enqueued += 1;
        }
        for id in store.list_by_status(JobStatus::Processing).await? {
            let record = store.get_record(&id).await?;
            let ticket = JobTicket {
                submission_id: id,
                attempt_count: record.attempt_count,
                // The machine merges the stored checkpoint on entry.
                checkpoint: Checkpoint::default(),
            };
            self.queue.enqueue(ticket, Duration::ZERO).await?;
            enqueued += 1;
        }

        info!(count = enqueued, "recovered unfinished jobs");
        Ok(enqueued)
    }

    /// Consume tickets until the queue closes or, with `drain`, until no
    /// ticket is pending and no job is running.
    pub async fn run(&self, drain: bool) -> WorkerStats {
        let capacity = self.config.max_concurrent_jobs.max(1);
        let mut stats = WorkerStats::default();
        let mut running: JoinSet<Finished> = JoinSet::new();
        let mut in_flight: HashSet<SubmissionId> = HashSet::new();
        let mut last_start: Option<Instant> = None;
        let mut queue_open = true;

        loop {
            if running.is_empty() && (!queue_open || (drain && self.queue.pending() == 0)) {
                break;
            }

            let start_gate = last_start.map(|last| last + self.config.job_start_interval);
            let next_ticket = async {
                if let Some(at) = start_gate {
                    tokio::time::sleep_until(at).await;
                }
                self.queue.next().await
            };

            tokio::select! {
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    match joined {
                        Ok((ticket, result)) => {
                            in_flight.remove(&ticket.submission_id);
                            self.settle(ticket, result, &mut stats).await;
                        }
                        // The outer task only awaits the inner handle.
                        Err(e) => error!(error = %e, "job supervisor task lost"),
                    }
                    METRICS.flush();
                }
                next = next_ticket, if queue_open && running.len() < capacity => {
                    let Some(ticket) = next else {
                        debug!("job queue closed");
                        queue_open = false;
                        continue;
                    };

                    if in_flight.contains(&ticket.submission_id) {
                        debug!(submission_id = %ticket.submission_id, "job already running, deferring ticket");
                        if let Err(e) = self.queue.enqueue(ticket, DUPLICATE_DEFER).await {
                            warn!(error = %e, "deferred ticket dropped");
                        }
                        continue;
                    }

                    last_start = Some(Instant::now());

                    in_flight.insert(ticket.submission_id.clone());
                    stats.started += 1;
                    let machine = Arc::clone(&self.machine);
                    running.spawn(async move {
                        let attempt = tokio::spawn({
                            let ticket = ticket.clone();
                            async move { machine.run_attempt(ticket).await }
                        });
                        (ticket, attempt.await)
                    });
                }
                else => break,
            }
        }

        info!(
            started = stats.started,
            completed = stats.completed,
            failed = stats.failed,
            retried = stats.retried,
            "worker stopped"
        );
        stats
    }

    async fn settle(
        &self,
        ticket: JobTicket,
        result: Result<Result<JobOutcome, StorageError>, JoinError>,
        stats: &mut WorkerStats,
    ) {
        match result {
            Ok(Ok(JobOutcome::Done(_))) => stats.completed += 1,
            Ok(Ok(JobOutcome::Failed(_))) => stats.failed += 1,
            Ok(Ok(JobOutcome::Skipped)) => stats.skipped += 1,
            Ok(Ok(JobOutcome::Retry { ticket, delay })) => {
                stats.retried += 1;
                let id = ticket.submission_id.clone();
                if let Err(e) = self.queue.enqueue(ticket, delay).await {
                    // The record is PROCESSING with its attempt count, so recovery resumes it.
                    warn!(submission_id = %id, error = %e, "retry not enqueued");
                }
            }
            Ok(Err(e)) => {
                {
                    let _span = JobSpan::enter(ticket.submission_id.as_str());
                    error!(error = %e, "job ended without a recorded status");
                }
                stats.failed += 1;
            }
            Err(e) => {
                {
                    let _span = JobSpan::enter(ticket.submission_id.as_str());
                    error!(error = %e, "job attempt panicked");
                }
                self.record_crash(&ticket, &e).await;
                stats.failed += 1;
            }
        }
    }

    /// Mark a job whose attempt task died as `FAILED`, keeping its checkpoint.
    async fn record_crash(&self, ticket: &JobTicket, cause: &JoinError) {
        let store = self.machine.store();
        let id = &ticket.submission_id;
        let (attempt, checkpoint) = match store.get_record(id).await {
            Ok(record) if record.status.is_terminal() => return,
            Ok(record) => (record.attempt_count, record.checkpoint),
            Err(e) => {
                warn!(submission_id = %id, error = %e, "could not load crashed job");
                (ticket.attempt_count, None)
            }
        };
        let update = StatusUpdate::failed(attempt, checkpoint, format!("job attempt crashed: {cause}"));
        if let Err(e) = store.save_status(id, update).await {
            error!(submission_id = %id, error = %e, "could not record crashed job");
        } else {
            METRICS.inc_jobs_failed();
        }
    }
}
