//! Rubric value types: competencies, score levels, and per-corrector results.

use serde::{Deserialize, Serialize};

use crate::domain::error::{GradingError, GradingResult};

/// Number of rubric competencies.
pub const COMPETENCY_COUNT: usize = 5;

/// One of the five rubric axes, numbered 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Competency(u8);

impl Competency {
    pub const ALL: [Competency; COMPETENCY_COUNT] = [
        Competency(1),
        Competency(2),
        Competency(3),
        Competency(4),
        Competency(5),
    ];

    pub fn number(self) -> u8 {
        self.0
    }

    /// Zero-based position inside a sorted score sequence.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Competency {
    type Error = GradingError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        if (1..=COMPETENCY_COUNT as u8).contains(&n) {
            Ok(Competency(n))
        } else {
            Err(GradingError::InvalidCompetency(i64::from(n)))
        }
    }
}

impl TryFrom<i64> for Competency {
    type Error = GradingError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        u8::try_from(n)
            .map_err(|_| GradingError::InvalidCompetency(n))
            .and_then(Competency::try_from)
    }
}

impl From<Competency> for u8 {
    fn from(c: Competency) -> Self {
        c.0
    }
}

impl std::fmt::Display for Competency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// The six permitted rubric levels (0-200 in steps of 40).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub enum ScoreLevel {
    L0,
    L40,
    L80,
    L120,
    L160,
    L200,
}

impl ScoreLevel {
    pub fn points(self) -> u16 {
        match self {
            ScoreLevel::L0 => 0,
            ScoreLevel::L40 => 40,
            ScoreLevel::L80 => 80,
            ScoreLevel::L120 => 120,
            ScoreLevel::L160 => 160,
            ScoreLevel::L200 => 200,
        }
    }
}

impl TryFrom<i64> for ScoreLevel {
    type Error = GradingError;

    fn try_from(points: i64) -> Result<Self, Self::Error> {
        match points {
            0 => Ok(ScoreLevel::L0),
            40 => Ok(ScoreLevel::L40),
            80 => Ok(ScoreLevel::L80),
            120 => Ok(ScoreLevel::L120),
            160 => Ok(ScoreLevel::L160),
            200 => Ok(ScoreLevel::L200),
            other => Err(GradingError::InvalidScore(other)),
        }
    }
}

impl From<ScoreLevel> for u16 {
    fn from(level: ScoreLevel) -> Self {
        level.points()
    }
}

impl std::fmt::Display for ScoreLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.points())
    }
}

/// A single competency's score as produced by one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub competency: Competency,
    pub score: ScoreLevel,
    pub rationale: String,
}

impl CompetencyScore {
    pub fn new(competency: Competency, score: ScoreLevel, rationale: impl Into<String>) -> Self {
        Self {
            competency,
            score,
            rationale: rationale.into(),
        }
    }

    /// Zero-score stand-in for a competency whose evaluation failed.
    pub fn placeholder(competency: Competency, reason: &str) -> Self {
        Self {
            competency,
            score: ScoreLevel::L0,
            rationale: format!(
                "evaluation failed for competency {}: {reason}",
                competency.number()
            ),
        }
    }

    pub fn points(&self) -> u16 {
        self.score.points()
    }
}

/// One corrector's complete pass: five sorted scores, their sum, and a narrative.
///
/// Only [`CorrectorResult::assemble`] (and validated deserialisation) can build
/// one, so `scores.len() == 5`, the scores are ordered 1..=5, and `total` is
/// their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCorrectorResult")]
pub struct CorrectorResult {
    corrector_id: String,
    scores: Vec<CompetencyScore>,
    total: u16,
    summary: String,
}

#[derive(Deserialize)]
struct RawCorrectorResult {
    corrector_id: String,
    scores: Vec<CompetencyScore>,
    total: u16,
    summary: String,
}

impl TryFrom<RawCorrectorResult> for CorrectorResult {
    type Error = GradingError;

    fn try_from(raw: RawCorrectorResult) -> Result<Self, Self::Error> {
        let result = CorrectorResult::assemble(raw.corrector_id, raw.scores, raw.summary)?;
        if result.total != raw.total {
            return Err(GradingError::InconsistentResult(format!(
                "{}: stored total {} but scores sum to {}",
                result.corrector_id, raw.total, result.total
            )));
        }
        Ok(result)
    }
}

impl CorrectorResult {
    /// Sort `scores` by competency, check that each competency appears exactly
    /// once, and compute the total.
    pub fn assemble(
        corrector_id: impl Into<String>,
        mut scores: Vec<CompetencyScore>,
        summary: impl Into<String>,
    ) -> GradingResult<Self> {
        let corrector_id = corrector_id.into();
        scores.sort_by_key(|s| s.competency);

        let complete = scores.len() == COMPETENCY_COUNT
            && scores
                .iter()
                .zip(Competency::ALL)
                .all(|(score, expected)| score.competency == expected);
        if !complete {
            let got: Vec<u8> = scores.iter().map(|s| s.competency.number()).collect();
            return Err(GradingError::InconsistentResult(format!(
                "{corrector_id}: expected competencies 1..=5 once each, got {got:?}"
            )));
        }

        let total = scores.iter().map(CompetencyScore::points).sum();
        Ok(Self {
            corrector_id,
            scores,
            total,
            summary: summary.into(),
        })
    }

    /// Build from a pass whose slot `i` already holds competency `i + 1`.
    pub(crate) fn from_ordered(
        corrector_id: impl Into<String>,
        scores: [CompetencyScore; COMPETENCY_COUNT],
        summary: impl Into<String>,
    ) -> Self {
        debug_assert!(scores
            .iter()
            .zip(Competency::ALL)
            .all(|(s, c)| s.competency == c));
        let total = scores.iter().map(CompetencyScore::points).sum();
        Self {
            corrector_id: corrector_id.into(),
            scores: scores.into(),
            total,
            summary: summary.into(),
        }
    }

    pub fn corrector_id(&self) -> &str {
        &self.corrector_id
    }

    /// Scores ordered by competency 1..=5.
    pub fn scores(&self) -> &[CompetencyScore] {
        &self.scores
    }

    pub fn score(&self, competency: Competency) -> &CompetencyScore {
        &self.scores[competency.index()]
    }

    pub fn total(&self) -> u16 {
        self.total
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}
