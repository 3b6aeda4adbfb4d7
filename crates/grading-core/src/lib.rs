//! Grading Core Library
//!
//! Committee grading of essay submissions against a five-competency rubric:
//! two correctors score every competency, a supervisor breaks discrepancies,
//! and each job is checkpointed so quota failures resume where they stopped.

pub mod committee;
pub mod competency;
pub mod config;
pub mod corrector;
pub mod domain;
pub mod evaluator;
pub mod job;
pub mod metrics;
pub mod obs;
pub mod service;
pub mod telemetry;

pub use committee::{
    consolidate, consolidate_average, has_discrepancy, resolve_with_supervisor, Committee,
    CommitteeProfiles, Verdict, COMPETENCY_DISCREPANCY_THRESHOLD, TOTAL_DISCREPANCY_THRESHOLD,
};
pub use competency::evaluate_competency;
pub use config::GradingConfig;
pub use corrector::{run_corrector_pass, SUMMARY_FALLBACK};

pub use domain::{
    Checkpoint, CheckpointError, Competency, CompetencyScore, ConsolidatedResult,
    ConsolidatedScore, CorrectorResult, CorrectorSlot, DimensionSpec, Essay, GradingError,
    GradingResult, ResultSource, Rubric, ScoreLevel, SealedCheckpoint, CHECKPOINT_VERSION,
};

pub use evaluator::{
    CorrectorProfile, EvaluationRequest, Evaluator, EvaluatorError, GeminiConfig,
    GeminiEvaluator, QuotaExceeded,
};

pub use job::{
    JobConfig, JobError, JobMachine, JobOutcome, JobQueue, JobTicket, MemoryJobQueue,
    QueueError, RetryPolicy, Worker, WorkerConfig, WorkerStats,
};
pub use job::worker::WorkerError;

pub use service::{GradingService, ServiceError};

pub use telemetry::init_tracing;

pub use grading_state::{
    JobStatus, StatusView, StorageError, SubmissionId, SubmissionStore, SurrealSubmissionStore,
};
