//! Domain models for the grading engine.
//!
//! Canonical definitions for the core entities:
//! - `Essay`: the text and topic under grading
//! - `CompetencyScore` / `CorrectorResult`: one corrector's validated scores
//! - `ConsolidatedResult`: the committee's final result
//! - `Checkpoint`: completed stages of a job, sealed for persistence
//! - `Rubric`: the five competency descriptions handed to the evaluator

pub mod checkpoint;
pub mod consolidated;
pub mod digest;
pub mod essay;
pub mod error;
pub mod rubric;
pub mod score;

// Re-export main types and errors
pub use checkpoint::{Checkpoint, CorrectorSlot, SealedCheckpoint, CHECKPOINT_VERSION};
pub use consolidated::{ConsolidatedResult, ConsolidatedScore, ResultSource};
pub use essay::Essay;
pub use error::{CheckpointError, GradingError, GradingResult};
pub use rubric::{DimensionSpec, Rubric};
pub use score::{Competency, CompetencyScore, CorrectorResult, ScoreLevel, COMPETENCY_COUNT};
