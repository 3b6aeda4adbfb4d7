//! Structured lifecycle events for grading jobs.
//!
//! This module provides:
//! - Job-scoped tracing spans via the `JobSpan` RAII guard
//! - Emission functions for job start, stage completion, retry scheduling,
//!   job completion, committee discrepancies and degraded evaluations
//!
//! Events are emitted at `info!` level (`warn!` for degraded evaluations)
//! with an `event` field naming the lifecycle step.

use std::time::Duration;

use tracing::{info, warn};

/// RAII guard that enters a job-scoped tracing span.
///
/// ```ignore
/// let _span = JobSpan::enter("9b2f...");
/// // every event below carries submission_id = "9b2f..."
/// ```
pub struct JobSpan {
    _span: tracing::span::EnteredSpan,
}

impl JobSpan {
    pub fn enter(submission_id: &str) -> Self {
        let span = tracing::info_span!("grader.job", submission_id = %submission_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: an attempt began, resuming from `resumed_slots`.
pub fn emit_job_started(submission_id: &str, attempt: u32, resumed_slots: &[&str]) {
    info!(
        event = "job.started",
        submission_id = %submission_id,
        attempt = attempt,
        resumed = ?resumed_slots,
    );
}

/// Emit event: a corrector stage finished and was checkpointed.
pub fn emit_stage_completed(submission_id: &str, stage: &str, total: u16) {
    info!(
        event = "job.stage_completed",
        submission_id = %submission_id,
        stage = %stage,
        total = total,
    );
}

/// Emit event: quota hit, job re-enqueued after `delay`.
pub fn emit_retry_scheduled(submission_id: &str, attempt: u32, delay: Duration) {
    info!(
        event = "job.retry_scheduled",
        submission_id = %submission_id,
        attempt = attempt,
        delay_secs = delay.as_secs(),
    );
}

/// Emit event: the job reached a terminal status.
pub fn emit_job_finished(submission_id: &str, status: &str, duration_ms: u64) {
    info!(
        event = "job.finished",
        submission_id = %submission_id,
        status = %status,
        duration_ms = duration_ms,
    );
}

/// Emit event: the two correctors disagreed and a supervisor is required.
pub fn emit_discrepancy(total_a: u16, total_b: u16, max_competency_gap: u16) {
    info!(
        event = "committee.discrepancy",
        total_a = total_a,
        total_b = total_b,
        max_competency_gap = max_competency_gap,
    );
}

/// Emit event: one competency fell back to a zero-score placeholder.
pub fn emit_competency_degraded(corrector_id: &str, competency: u8, reason: &str) {
    warn!(
        event = "competency.degraded",
        corrector = %corrector_id,
        competency = competency,
        reason = %reason,
    );
}
