//! Competency evaluation step: one evaluator call for one rubric competency.
//!
//! Evaluation defects never leave this step as errors. They become a
//! zero-score placeholder so one bad competency cannot abort a pass. Quota
//! failures are the exception and propagate unchanged.

use tracing::debug;

use crate::domain::CompetencyScore;
use crate::evaluator::{EvaluationRequest, Evaluator, EvaluatorError, QuotaExceeded};
use crate::metrics::METRICS;
use crate::obs;

/// Score `request.dimension` once.
pub async fn evaluate_competency(
    evaluator: &dyn Evaluator,
    request: &EvaluationRequest<'_>,
) -> Result<CompetencyScore, QuotaExceeded> {
    let expected = request.dimension.competency;

    let outcome = match evaluator.evaluate(request).await {
        Ok(score) if score.competency == expected => Ok(score),
        Ok(score) => Err(EvaluatorError::EvaluationFailed(format!(
            "reply scored competency {} instead of {}",
            score.competency.number(),
            expected.number()
        ))),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(score) => {
            debug!(
                corrector = %request.profile.id,
                competency = expected.number(),
                score = score.points(),
                "competency evaluated"
            );
            Ok(score)
        }
        Err(EvaluatorError::QuotaExceeded { retry_after }) => {
            METRICS.inc_quota_hits();
            Err(QuotaExceeded { retry_after })
        }
        Err(EvaluatorError::EvaluationFailed(reason)) => Ok(degrade(
            &request.profile.id,
            CompetencyScore::placeholder(expected, &reason),
            &reason,
        )),
    }
}

/// Record a placeholder substitution and hand the placeholder back.
pub(crate) fn degrade(corrector_id: &str, placeholder: CompetencyScore, reason: &str) -> CompetencyScore {
    METRICS.inc_evaluations_degraded();
    obs::emit_competency_degraded(corrector_id, placeholder.competency.number(), reason);
    placeholder
}
