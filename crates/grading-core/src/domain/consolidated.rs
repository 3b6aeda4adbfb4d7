//! The committee's final, per-job result.

use serde::{Deserialize, Serialize};

use crate::domain::score::{Competency, CorrectorResult};

/// How the final scores were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultSource {
    /// Two correctors agreed closely enough; each competency is their mean.
    Averaged,
    /// A supervisor pass broke a discrepancy; each competency is the mean of
    /// the closest pair among three.
    SupervisorConsensus,
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSource::Averaged => f.write_str("AVERAGED"),
            ResultSource::SupervisorConsensus => f.write_str("SUPERVISOR_CONSENSUS"),
        }
    }
}

/// Final score for one competency. Averages may fall between rubric levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedScore {
    pub competency: Competency,
    pub score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    /// Ordered by competency 1..=5.
    pub scores: Vec<ConsolidatedScore>,
    pub total: f64,
    pub source: ResultSource,
    /// The two or three corrector results this was derived from.
    pub inputs: Vec<CorrectorResult>,
}

impl ConsolidatedResult {
    pub fn new(
        scores: Vec<ConsolidatedScore>,
        source: ResultSource,
        inputs: Vec<CorrectorResult>,
    ) -> Self {
        let total = scores.iter().map(|s| s.score).sum();
        Self {
            scores,
            total,
            source,
            inputs,
        }
    }
}
