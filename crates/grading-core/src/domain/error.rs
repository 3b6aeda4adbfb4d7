//! Domain-level error taxonomy for the grading engine.

/// Errors produced while decoding a persisted checkpoint.
///
/// Any of these is fatal for the job: a checkpoint that cannot be trusted is
/// never partially reused.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("unsupported checkpoint version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("checkpoint digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("malformed checkpoint: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Grading domain errors.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("competency out of range 1..=5: {0}")]
    InvalidCompetency(i64),

    #[error("score is not a rubric level (0, 40, 80, 120, 160, 200): {0}")]
    InvalidScore(i64),

    #[error("inconsistent corrector result: {0}")]
    InconsistentResult(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for grading domain operations.
pub type GradingResult<T> = std::result::Result<T, GradingError>;
