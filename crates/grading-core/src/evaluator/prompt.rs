//! Prompt construction and reply parsing for text-generation evaluators.

use serde::Deserialize;

use crate::domain::{Competency, CompetencyScore, DimensionSpec, ScoreLevel};
use crate::evaluator::EvaluatorError;

/// Build the single-competency grading prompt.
pub fn competency_prompt(dimension: &DimensionSpec, text: &str, topic: &str) -> String {
    let n = dimension.competency.number();
    format!(
        "You are a senior examiner on the official essay grading board, known for being \
extremely strict, technical and impartial. Your job is not to praise the student but to audit \
the text for flaws, gaps and deviations from the official rubric.\n\
You are grading ONLY competency {n}: {title}.\n\n\
=== WHAT TO LOOK FOR (ANTI-CRITERIA) ===\n\
To avoid inflating the score, actively check:\n{anti}\n\n\
=== SCORING CRITERIA (competency {n}) ===\n{criteria}\n\n\
=== STUDENT ESSAY ===\n{text}\n\
=======================\n\
Topic: {topic}\n\n\
=== REASONING INSTRUCTIONS ===\n\
1. First, look for evidence of the failures listed in the anti-criteria.\n\
2. If you find serious failures, the score drops to the matching level immediately.\n\
3. A polished or well formatted text does not guarantee 200. The content must be deep.\n\n\
=== OUTPUT INSTRUCTIONS ===\n\
Reply with a single JSON object and nothing else, with these fields in this order:\n\
\"competency\" (integer, always {n}),\n\
\"critical_analysis\" (string: the errors you found, written BEFORE deciding the score),\n\
\"score\" (integer, one of 0, 40, 80, 120, 160, 200),\n\
\"rationale\" (string: a short justification of the score for the student).",
        title = dimension.title,
        anti = dimension.anti_criteria,
        criteria = dimension.criteria,
    )
}

/// Build the summary prompt from five sorted scores.
pub fn summary_prompt(scores: &[CompetencyScore]) -> Result<String, EvaluatorError> {
    let evaluations = serde_json::to_string(scores)
        .map_err(|e| EvaluatorError::EvaluationFailed(format!("encode scores: {e}")))?;
    Ok(format!(
        "Based on these five competency evaluations of an essay, write one concise, \
motivating and useful paragraph of general feedback for the student. \
Evaluations: {evaluations}"
    ))
}

/// Raw reply shape; validated into a [`CompetencyScore`] by [`parse_competency_reply`].
///
/// `critical_analysis` only steers the model's reasoning and is not kept.
#[derive(Debug, Deserialize)]
struct CompetencyReply {
    competency: i64,
    score: i64,
    rationale: String,
}

/// Remove a surrounding Markdown code fence, if present.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse and validate one competency reply.
///
/// Malformed JSON, a score outside the rubric levels, or a competency other
/// than `expected` are all `EvaluationFailed`.
pub fn parse_competency_reply(
    reply: &str,
    expected: Competency,
) -> Result<CompetencyScore, EvaluatorError> {
    let parsed: CompetencyReply = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| EvaluatorError::EvaluationFailed(format!("malformed evaluator reply: {e}")))?;

    let competency = Competency::try_from(parsed.competency)
        .map_err(|e| EvaluatorError::EvaluationFailed(e.to_string()))?;
    if competency != expected {
        return Err(EvaluatorError::EvaluationFailed(format!(
            "reply scored competency {} instead of {}",
            competency.number(),
            expected.number()
        )));
    }
    let score = ScoreLevel::try_from(parsed.score)
        .map_err(|e| EvaluatorError::EvaluationFailed(e.to_string()))?;

    Ok(CompetencyScore::new(competency, score, parsed.rationale))
}
