//! Global atomic counters for grading jobs.
//!
//! Counters are incremented at the call site; [`Metrics::flush`] emits their
//! current values as one `info!` event (the worker flushes after each job).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters: no allocation, no locking.
pub struct Metrics {
    evaluations_degraded: AtomicU64,
    quota_hits: AtomicU64,
    retries_scheduled: AtomicU64,
    supervisor_passes: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            evaluations_degraded: AtomicU64::new(0),
            quota_hits: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
            supervisor_passes: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
        }
    }

    /// A competency evaluation was replaced by a zero-score placeholder.
    pub fn inc_evaluations_degraded(&self) {
        self.evaluations_degraded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations_degraded", "counter incremented");
    }

    pub fn inc_quota_hits(&self) {
        self.quota_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "quota_hits", "counter incremented");
    }

    pub fn inc_retries_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retries_scheduled", "counter incremented");
    }

    pub fn inc_supervisor_passes(&self) {
        self.supervisor_passes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "supervisor_passes", "counter incremented");
    }

    pub fn inc_jobs_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "jobs_completed", "counter incremented");
    }

    pub fn inc_jobs_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "jobs_failed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            evaluations_degraded = self.evaluations_degraded(),
            quota_hits = self.quota_hits(),
            retries_scheduled = self.retries_scheduled(),
            supervisor_passes = self.supervisor_passes(),
            jobs_completed = self.jobs_completed(),
            jobs_failed = self.jobs_failed(),
        );
    }

    pub fn evaluations_degraded(&self) -> u64 {
        self.evaluations_degraded.load(Ordering::Relaxed)
    }

    pub fn quota_hits(&self) -> u64 {
        self.quota_hits.load(Ordering::Relaxed)
    }

    pub fn retries_scheduled(&self) -> u64 {
        self.retries_scheduled.load(Ordering::Relaxed)
    }

    pub fn supervisor_passes(&self) -> u64 {
        self.supervisor_passes.load(Ordering::Relaxed)
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.evaluations_degraded,
            &self.quota_hits,
            &self.retries_scheduled,
            &self.supervisor_passes,
            &self.jobs_completed,
            &self.jobs_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
