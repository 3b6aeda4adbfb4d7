//! Evaluator client boundary.
//!
//! An [`Evaluator`] scores one rubric competency for a text and writes a
//! narrative summary from five finished scores. It performs no retries:
//! quota and evaluation failures reach the caller unmodified.

pub mod fakes;
pub mod gemini;
pub mod prompt;
pub mod retry_hint;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CompetencyScore, DimensionSpec};

pub use gemini::{GeminiConfig, GeminiEvaluator};

/// Failure kinds surfaced by an evaluator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluatorError {
    /// The provider's rate limit or quota was hit; `retry_after` is its
    /// suggested wait, when it gave one.
    #[error("evaluator quota exceeded (retry after {retry_after:?})")]
    QuotaExceeded { retry_after: Option<Duration> },

    /// Any other failure: transport, timeout, malformed or out-of-range output.
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),
}

impl EvaluatorError {
    pub fn is_quota(&self) -> bool {
        matches!(self, EvaluatorError::QuotaExceeded { .. })
    }
}

/// The one evaluator failure that crosses component boundaries.
///
/// Produced by the competency step and the corrector pass; only the job
/// machine decides whether it becomes a retry or a fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("evaluator quota exceeded (retry after {retry_after:?})")]
pub struct QuotaExceeded {
    pub retry_after: Option<Duration>,
}

impl QuotaExceeded {
    /// Keep the longest suggested wait of two quota failures.
    pub fn merge(self, other: QuotaExceeded) -> QuotaExceeded {
        QuotaExceeded {
            retry_after: self.retry_after.max(other.retry_after),
        }
    }
}

/// Identity and strictness of one corrector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectorProfile {
    pub id: String,
    /// Sampling temperature forwarded to the evaluator.
    pub temperature: f32,
}

impl CorrectorProfile {
    pub fn new(id: impl Into<String>, temperature: f32) -> Self {
        Self {
            id: id.into(),
            temperature,
        }
    }

    /// First corrector: strict profile.
    pub fn strict() -> Self {
        Self::new("corrector-1", 0.1)
    }

    /// Second corrector: standard profile.
    pub fn standard() -> Self {
        Self::new("corrector-2", 0.2)
    }

    /// Tie-breaking supervisor.
    pub fn supervisor() -> Self {
        Self::new("supervisor", 0.2)
    }
}

/// Everything needed to score one competency.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub profile: &'a CorrectorProfile,
    pub dimension: &'a DimensionSpec,
    pub text: &'a str,
    pub topic: &'a str,
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score one competency.
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<CompetencyScore, EvaluatorError>;

    /// One-paragraph narrative from five finished scores (sorted 1..=5).
    async fn summarize(
        &self,
        profile: &CorrectorProfile,
        scores: &[CompetencyScore],
    ) -> Result<String, EvaluatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profiles_match_committee_roles() {
        assert_eq!(CorrectorProfile::strict().temperature, 0.1);
        assert_eq!(CorrectorProfile::standard().temperature, 0.2);
        assert_eq!(CorrectorProfile::supervisor().id, "supervisor");
    }

    #[test]
    fn merge_keeps_longest_wait() {
        let none = QuotaExceeded { retry_after: None };
        let short = QuotaExceeded {
            retry_after: Some(Duration::from_secs(5)),
        };
        let long = QuotaExceeded {
            retry_after: Some(Duration::from_secs(20)),
        };
        assert_eq!(none.merge(short), short);
        assert_eq!(long.merge(short), long);
        assert_eq!(short.merge(long), long);
    }

    #[test]
    fn quota_is_distinguishable() {
        assert!(EvaluatorError::QuotaExceeded { retry_after: None }.is_quota());
        assert!(!EvaluatorError::EvaluationFailed("x".into()).is_quota());
    }
}
