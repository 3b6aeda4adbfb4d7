//! Job state machine: one resumable attempt at grading a submission.
//!
//! An attempt runs the committee stage by stage. Each completed stage is
//! written to the record's checkpoint in the same `save_status` call that
//! keeps it `PROCESSING`, so a later attempt reuses it instead of calling
//! the evaluator again. Quota failures become a [`JobOutcome::Retry`]; any
//! other error is fatal and marks the record `FAILED`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use grading_state::{JobStatus, StatusUpdate, StorageError, SubmissionId, SubmissionStore};

use crate::committee::{
    consolidate, max_competency_gap, resolve_with_supervisor, Committee, Verdict,
};
use crate::config::duration_secs;
use crate::domain::{Checkpoint, ConsolidatedResult, CorrectorSlot, Essay};
use crate::evaluator::QuotaExceeded;
use crate::job::backoff::{exhausted_message, RetryPolicy};
use crate::job::{JobError, JobOutcome, JobTicket};
use crate::metrics::METRICS;
use crate::obs;

/// Per-job tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub max_retries: u32,
    #[serde(with = "duration_secs", rename = "default_backoff_secs")]
    pub default_backoff: Duration,
    #[serde(with = "duration_secs", rename = "safety_margin_secs")]
    pub safety_margin: Duration,
    #[serde(with = "duration_secs", rename = "max_backoff_secs")]
    pub max_backoff: Duration,
    /// Proactive throttle between corrector stages (zero disables it).
    #[serde(with = "duration_secs", rename = "inter_stage_pause_secs")]
    pub inter_stage_pause: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_retries: retry.max_retries,
            default_backoff: retry.default_backoff,
            safety_margin: retry.safety_margin,
            max_backoff: retry.max_backoff,
            inter_stage_pause: Duration::from_secs(5),
        }
    }
}

impl JobConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            default_backoff: self.default_backoff,
            safety_margin: self.safety_margin,
            max_backoff: self.max_backoff,
        }
    }
}

/// Where an attempt stopped.
enum Progress {
    Finished(ConsolidatedResult),
    Quota(QuotaExceeded),
}

/// Drives a job through its stages against a record store.
pub struct JobMachine {
    store: Arc<dyn SubmissionStore>,
    committee: Committee,
    config: JobConfig,
    policy: RetryPolicy,
}

impl JobMachine {
    pub fn new(store: Arc<dyn SubmissionStore>, committee: Committee, config: JobConfig) -> Self {
        let policy = config.retry_policy();
        Self {
            store,
            committee,
            config,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    /// Run one attempt for `ticket`.
    ///
    /// Never enqueues anything itself: a retry is returned to the caller,
    /// which re-delivers it once this attempt has fully returned. The only
    /// error is a storage failure while recording `FAILED`.
    #[instrument(
        skip(self, ticket),
        fields(submission_id = %ticket.submission_id, attempt = ticket.attempt_count)
    )]
    pub async fn run_attempt(&self, ticket: JobTicket) -> Result<JobOutcome, StorageError> {
        let started = Instant::now();
        let id = ticket.submission_id.clone();

        let record = match self.store.get_record(&id).await {
            Ok(record) => record,
            Err(StorageError::SubmissionNotFound { .. }) => {
                error!(submission_id = %id, "job ticket for unknown submission");
                return Ok(JobOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };
        if record.status.is_terminal() {
            info!(submission_id = %id, status = %record.status, "job already finished, skipping");
            return Ok(JobOutcome::Skipped);
        }

        let attempt = ticket.attempt_count.max(record.attempt_count);
        let mut checkpoint = ticket.checkpoint;
        if let Some(stored) = record.checkpoint {
            match Checkpoint::from_value(stored) {
                Ok(stored) => checkpoint.fill_missing_from(stored),
                Err(e) => {
                    let err = JobError::from(e);
                    return self.fail(&id, attempt, &checkpoint, err.to_string(), started).await;
                }
            }
        }

        let essay = Arc::new(Essay::from(record.submission));
        match self.advance(&id, attempt, &mut checkpoint, essay).await {
            Ok(Progress::Finished(result)) => self.finish(&id, attempt, &checkpoint, result, started).await,
            Ok(Progress::Quota(hit)) => self.schedule_retry(&id, attempt, checkpoint, hit, started).await,
            Err(e) => self.fail(&id, attempt, &checkpoint, e.to_string(), started).await,
        }
    }

    /// Run every stage whose slot is still empty.
    async fn advance(
        &self,
        id: &SubmissionId,
        attempt: u32,
        checkpoint: &mut Checkpoint,
        essay: Arc<Essay>,
    ) -> Result<Progress, JobError> {
        self.save_checkpoint(id, attempt, checkpoint).await?;
        obs::emit_job_started(id.as_str(), attempt, &checkpoint.filled_slots());

        // Stages A and B
        let need_first = !checkpoint.is_filled(CorrectorSlot::First);
        let need_second = !checkpoint.is_filled(CorrectorSlot::Second);
        if need_first || need_second {
            let pause = self.config.inter_stage_pause;
            let first = async {
                if need_first {
                    Some(self.committee.run_stage(CorrectorSlot::First, Arc::clone(&essay)).await)
                } else {
                    None
                }
            };
            let second = async {
                if !need_second {
                    return None;
                }
                if need_first && !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                Some(self.committee.run_stage(CorrectorSlot::Second, Arc::clone(&essay)).await)
            };
            let (first, second) = tokio::join!(first, second);

            let mut quota: Option<QuotaExceeded> = None;
            for (slot, outcome) in [(CorrectorSlot::First, first), (CorrectorSlot::Second, second)] {
                match outcome {
                    Some(Ok(result)) => {
                        obs::emit_stage_completed(id.as_str(), slot.as_str(), result.total());
                        checkpoint.set(slot, result);
                    }
                    Some(Err(hit)) => quota = Some(quota.map_or(hit, |prev| prev.merge(hit))),
                    None => {}
                }
            }
            self.save_checkpoint(id, attempt, checkpoint).await?;
            if let Some(hit) = quota {
                return Ok(Progress::Quota(hit));
            }
        }

        let (Some(a), Some(b)) = (checkpoint.corrector1.clone(), checkpoint.corrector2.clone())
        else {
            return Err(JobError::IncompleteCheckpoint(checkpoint.filled_slots().join(",")));
        };

        // Stage C, only on discrepancy
        if let Verdict::Consolidated(result) = consolidate(&a, &b, checkpoint.supervisor.as_ref()) {
            return Ok(Progress::Finished(result));
        }
        obs::emit_discrepancy(a.total(), b.total(), max_competency_gap(&a, &b));

        if !self.config.inter_stage_pause.is_zero() {
            tokio::time::sleep(self.config.inter_stage_pause).await;
        }
        let supervisor = match self.committee.run_stage(CorrectorSlot::Supervisor, essay).await {
            Ok(result) => result,
            Err(hit) => return Ok(Progress::Quota(hit)),
        };
        obs::emit_stage_completed(id.as_str(), CorrectorSlot::Supervisor.as_str(), supervisor.total());
        let result = resolve_with_supervisor(&a, &b, &supervisor);
        checkpoint.set(CorrectorSlot::Supervisor, supervisor);
        self.save_checkpoint(id, attempt, checkpoint).await?;

        Ok(Progress::Finished(result))
    }

    async fn save_checkpoint(
        &self,
        id: &SubmissionId,
        attempt: u32,
        checkpoint: &Checkpoint,
    ) -> Result<(), JobError> {
        let update = StatusUpdate::processing(attempt, Some(checkpoint.to_value()?));
        self.store.save_status(id, update).await?;
        Ok(())
    }

    async fn finish(
        &self,
        id: &SubmissionId,
        attempt: u32,
        checkpoint: &Checkpoint,
        result: ConsolidatedResult,
        started: Instant,
    ) -> Result<JobOutcome, StorageError> {
        let write = match (checkpoint.to_value(), serde_json::to_value(&result)) {
            (Ok(cp), Ok(value)) => {
                self.store
                    .save_status(id, StatusUpdate::done(attempt, Some(cp), value))
                    .await
            }
            (Err(e), _) => return self.fail(id, attempt, checkpoint, e.to_string(), started).await,
            (_, Err(e)) => return self.fail(id, attempt, checkpoint, e.to_string(), started).await,
        };
        if let Err(e) = write {
            return self.fail(id, attempt, checkpoint, e.to_string(), started).await;
        }

        METRICS.inc_jobs_completed();
        obs::emit_job_finished(id.as_str(), JobStatus::Done.as_str(), elapsed_ms(started));
        info!(submission_id = %id, total = result.total, source = %result.source, "job done");
        Ok(JobOutcome::Done(Box::new(result)))
    }

    async fn schedule_retry(
        &self,
        id: &SubmissionId,
        attempt: u32,
        checkpoint: Checkpoint,
        hit: QuotaExceeded,
        started: Instant,
    ) -> Result<JobOutcome, StorageError> {
        let Some(next) = self.policy.next_attempt(attempt) else {
            let message = exhausted_message(attempt.saturating_add(1));
            return self.fail(id, attempt, &checkpoint, message, started).await;
        };
        let delay = self.policy.backoff(hit.retry_after);

        // Persist the bumped attempt count so a restart resumes the budget.
        let persisted = match checkpoint.to_value() {
            Ok(cp) => self.store.save_status(id, StatusUpdate::processing(next, Some(cp))).await,
            Err(e) => return self.fail(id, attempt, &checkpoint, e.to_string(), started).await,
        };
        if let Err(e) = persisted {
            return self.fail(id, attempt, &checkpoint, e.to_string(), started).await;
        }

        METRICS.inc_retries_scheduled();
        obs::emit_retry_scheduled(id.as_str(), next, delay);
        Ok(JobOutcome::Retry {
            ticket: JobTicket {
                submission_id: id.clone(),
                attempt_count: next,
                checkpoint,
            },
            delay,
        })
    }

    async fn fail(
        &self,
        id: &SubmissionId,
        attempt: u32,
        checkpoint: &Checkpoint,
        message: String,
        started: Instant,
    ) -> Result<JobOutcome, StorageError> {
        warn!(submission_id = %id, error = %message, "job failed");
        let cp = checkpoint.to_value().ok();
        if let Err(e) = self
            .store
            .save_status(id, StatusUpdate::failed(attempt, cp, message.clone()))
            .await
        {
            error!(submission_id = %id, error = %e, "could not record job failure");
            return Err(e);
        }

        METRICS.inc_jobs_failed();
        obs::emit_job_finished(id.as_str(), JobStatus::Failed.as_str(), elapsed_ms(started));
        Ok(JobOutcome::Failed(message))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResultSource;
    use crate::evaluator::fakes::ScriptedEvaluator;
    use grading_state::fakes::MemorySubmissionStore;

    struct Fixture {
        store: Arc<MemorySubmissionStore>,
        evaluator: Arc<ScriptedEvaluator>,
        machine: JobMachine,
    }

    fn fixture(evaluator: ScriptedEvaluator, config: JobConfig) -> Fixture {
        let store = Arc::new(MemorySubmissionStore::new());
        let evaluator = Arc::new(evaluator);
        let committee = Committee::new(evaluator.clone());
        let machine = JobMachine::new(store.clone(), committee, config);
        Fixture {
            store,
            evaluator,
            machine,
        }
    }

    async fn submit(store: &MemorySubmissionStore) -> SubmissionId {
        store
            .create_submission("Public transport", "An essay about buses.")
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn agreeing_correctors_finish_with_average() {
        let fx = fixture(
            ScriptedEvaluator::new()
                .with_scores("corrector-1", [160, 160, 160, 120, 120])
                .with_scores("corrector-2", [160, 160, 160, 160, 120]),
            JobConfig::default(),
        );
        let id = submit(&fx.store).await;

        let outcome = fx.machine.run_attempt(JobTicket::first(id.clone())).await.unwrap();
        let JobOutcome::Done(result) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(result.total, 740.0);
        assert_eq!(result.source, ResultSource::Averaged);
        assert_eq!(fx.evaluator.evaluate_calls("supervisor"), 0);

        let record = fx.store.get_record(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Done);
        assert_eq!(record.result.unwrap()["source"], "AVERAGED");
    }

    #[tokio::test(start_paused = true)]
    async fn discrepancy_escalates_to_supervisor() {
        let fx = fixture(
            ScriptedEvaluator::new()
                .with_scores("corrector-1", [80; 5])
                .with_scores("corrector-2", [120; 5]),
            JobConfig::default(),
        );
        let id = submit(&fx.store).await;

        let outcome = fx.machine.run_attempt(JobTicket::first(id.clone())).await.unwrap();
        let JobOutcome::Done(result) = outcome else {
            panic!("expected Done, got {outcome:?}");
        };
        assert_eq!(result.source, ResultSource::SupervisorConsensus);
        assert_eq!(result.total, 600.0);
        assert_eq!(result.inputs.len(), 3);
        assert_eq!(fx.evaluator.evaluate_calls("supervisor"), 5);

        let record = fx.store.get_record(&id).await.unwrap();
        let cp = Checkpoint::from_value(record.checkpoint.unwrap()).unwrap();
        assert_eq!(cp.filled_slots(), vec!["corrector1", "corrector2", "supervisor"]);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_schedules_retry_and_keeps_finished_stage() {
        let fx = fixture(
            ScriptedEvaluator::new().quota_failures(
                "corrector-2",
                5,
                Some(Duration::from_secs(20)),
            ),
            JobConfig::default(),
        );
        let id = submit(&fx.store).await;

        let outcome = fx.machine.run_attempt(JobTicket::first(id.clone())).await.unwrap();
        let JobOutcome::Retry { ticket, delay } = outcome else {
            panic!("expected Retry, got {outcome:?}");
        };
        assert_eq!(delay, Duration::from_secs(21));
        assert_eq!(ticket.attempt_count, 1);
        assert_eq!(ticket.checkpoint.filled_slots(), vec!["corrector1"]);

        let record = fx.store.get_record(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Processing);
        assert_eq!(record.attempt_count, 1);
        let stored = Checkpoint::from_value(record.checkpoint.unwrap()).unwrap();
        assert_eq!(stored, ticket.checkpoint);

        // Re-entry reuses the checkpointed first corrector.
        let first_calls = fx.evaluator.evaluate_calls("corrector-1");
        let outcome = fx.machine.run_attempt(ticket).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Done(_)));
        assert_eq!(fx.evaluator.evaluate_calls("corrector-1"), first_calls);
        assert_eq!(fx.store.get_record(&id).await.unwrap().attempt_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_retry_hint_uses_default_backoff() {
        let fx = fixture(
            ScriptedEvaluator::new().quota_failures("corrector-1", 5, None),
            JobConfig::default(),
        );
        let id = submit(&fx.store).await;

        let outcome = fx.machine.run_attempt(JobTicket::first(id)).await.unwrap();
        let JobOutcome::Retry { delay, .. } = outcome else {
            panic!("expected Retry, got {outcome:?}");
        };
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_fails_the_job() {
        let config = JobConfig {
            max_retries: 0,
            ..JobConfig::default()
        };
        let fx = fixture(
            ScriptedEvaluator::new().quota_failures("corrector-1", 5, None),
            config,
        );
        let id = submit(&fx.store).await;

        let outcome = fx.machine.run_attempt(JobTicket::first(id.clone())).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Failed("retry budget exhausted after 1 attempts".into())
        );
        let record = fx.store.get_record(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("retry budget exhausted after 1 attempts")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn finished_and_unknown_jobs_are_skipped() {
        let fx = fixture(ScriptedEvaluator::new(), JobConfig::default());
        let id = submit(&fx.store).await;
        assert!(matches!(
            fx.machine.run_attempt(JobTicket::first(id.clone())).await.unwrap(),
            JobOutcome::Done(_)
        ));
        let calls = fx.evaluator.evaluate_calls("corrector-1");

        let again = fx.machine.run_attempt(JobTicket::first(id)).await.unwrap();
        assert_eq!(again, JobOutcome::Skipped);
        assert_eq!(fx.evaluator.evaluate_calls("corrector-1"), calls);

        let ghost = JobTicket::first(SubmissionId::from("no-such-submission"));
        assert_eq!(fx.machine.run_attempt(ghost).await.unwrap(), JobOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_checkpoint_is_fatal() {
        let fx = fixture(ScriptedEvaluator::new(), JobConfig::default());
        let id = submit(&fx.store).await;
        fx.store
            .save_status(
                &id,
                StatusUpdate::processing(0, Some(serde_json::json!({"version": 1}))),
            )
            .await
            .unwrap();

        let outcome = fx.machine.run_attempt(JobTicket::first(id.clone())).await.unwrap();
        let JobOutcome::Failed(message) = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert!(message.starts_with("unreadable checkpoint"), "{message}");
        assert_eq!(fx.evaluator.evaluate_calls("corrector-1"), 0);
        assert_eq!(
            fx.store.get_record(&id).await.unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_corrector_starts_after_the_pause() {
        let fx = fixture(
            ScriptedEvaluator::new().with_latency(Duration::from_secs(1)),
            JobConfig {
                inter_stage_pause: Duration::from_secs(5),
                ..JobConfig::default()
            },
        );
        let id = submit(&fx.store).await;
        let start = tokio::time::Instant::now();

        fx.machine.run_attempt(JobTicket::first(id)).await.unwrap();
        // 5s pause, then one second for competencies and one for the summary.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(8), "{elapsed:?}");
    }
}
