//! Corrector pass: five concurrent competency evaluations plus one summary.

use std::sync::Arc;

use tracing::{info, instrument, warn, Instrument};

use crate::competency::{degrade, evaluate_competency};
use crate::domain::{Competency, CompetencyScore, CorrectorResult, Essay, Rubric};
use crate::evaluator::{CorrectorProfile, EvaluationRequest, Evaluator, QuotaExceeded};
use crate::metrics::METRICS;

/// Narrative used when the summary call fails.
pub const SUMMARY_FALLBACK: &str =
    "Overall feedback could not be generated because of a processing error.";

/// Run one full corrector pass over `essay`.
///
/// Every competency runs on its own task and all five are awaited before
/// anything is returned, so no evaluator call is left unaccounted for. If
/// any step hit quota the pass fails with the longest suggested wait;
/// otherwise the result always holds five scores ordered 1..=5.
#[instrument(skip(evaluator, rubric, essay, profile), fields(corrector = %profile.id))]
pub async fn run_corrector_pass(
    evaluator: Arc<dyn Evaluator>,
    rubric: Arc<Rubric>,
    essay: Arc<Essay>,
    profile: &CorrectorProfile,
) -> Result<CorrectorResult, QuotaExceeded> {
    let handles = Competency::ALL.map(|competency| {
        let evaluator = Arc::clone(&evaluator);
        let rubric = Arc::clone(&rubric);
        let essay = Arc::clone(&essay);
        let profile = profile.clone();
        tokio::spawn(
            async move {
                let request = EvaluationRequest {
                    profile: &profile,
                    dimension: rubric.dimension(competency),
                    text: &essay.text,
                    topic: &essay.topic,
                };
                evaluate_competency(evaluator.as_ref(), &request).await
            }
            .in_current_span(),
        )
    });

    let mut scores = Competency::ALL.map(|c| CompetencyScore::placeholder(c, "not evaluated"));
    let mut quota: Option<QuotaExceeded> = None;

    for ((slot, competency), handle) in scores.iter_mut().zip(Competency::ALL).zip(handles) {
        match handle.await {
            Ok(Ok(score)) => *slot = score,
            Ok(Err(hit)) => quota = Some(quota.map_or(hit, |prev| prev.merge(hit))),
            Err(join_err) => {
                let reason = format!("evaluation task ended abnormally: {join_err}");
                *slot = degrade(
                    &profile.id,
                    CompetencyScore::placeholder(competency, &reason),
                    &reason,
                );
            }
        }
    }

    if let Some(hit) = quota {
        warn!(corrector = %profile.id, retry_after = ?hit.retry_after, "corrector pass hit quota");
        return Err(hit);
    }

    let summary = match evaluator.summarize(profile, &scores).await {
        Ok(summary) => summary,
        Err(e) => {
            if e.is_quota() {
                METRICS.inc_quota_hits();
            }
            warn!(corrector = %profile.id, error = %e, "summary failed, using fallback");
            SUMMARY_FALLBACK.to_string()
        }
    };

    let result = CorrectorResult::from_ordered(&profile.id, scores, summary);
    info!(corrector = %profile.id, total = result.total(), "corrector pass complete");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::ScoreLevel;
    use crate::evaluator::fakes::ScriptedEvaluator;
    use crate::evaluator::EvaluatorError;

    async fn pass(ev: Arc<ScriptedEvaluator>, id: &str) -> Result<CorrectorResult, QuotaExceeded> {
        run_corrector_pass(
            ev,
            Arc::new(Rubric::standard()),
            Arc::new(Essay::new("topic", "essay")),
            &CorrectorProfile::new(id, 0.1),
        )
        .await
    }

    #[tokio::test]
    async fn produces_five_sorted_scores_and_total() {
        let ev = Arc::new(ScriptedEvaluator::new().with_scores("c", [200, 160, 120, 160, 80]));
        let result = pass(ev.clone(), "c").await.unwrap();

        let order: Vec<u8> = result.scores().iter().map(|s| s.competency.number()).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert_eq!(result.total(), 720);
        assert_eq!(result.summary(), "c summary: total 720");
        assert_eq!(ev.evaluate_calls("c"), 5);
        assert_eq!(ev.summarize_calls("c"), 1);
    }

    #[tokio::test]
    async fn one_failed_competency_does_not_abort_the_pass() {
        let ev = Arc::new(
            ScriptedEvaluator::new()
                .with_scores("c", [200, 200, 200, 200, 200])
                .fail_competency("c", 3, "timeout"),
        );
        let result = pass(ev, "c").await.unwrap();

        assert_eq!(result.scores()[2].score, ScoreLevel::L0);
        assert!(result.scores()[2].rationale.contains("timeout"));
        assert_eq!(result.total(), 800);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_waits_for_all_siblings() {
        let ev = Arc::new(
            ScriptedEvaluator::new()
                .quota_failures("c", 2, Some(Duration::from_secs(20)))
                .with_latency(Duration::from_millis(500)),
        );
        let err = pass(ev.clone(), "c").await.unwrap_err();

        assert_eq!(err.retry_after, Some(Duration::from_secs(20)));
        assert_eq!(ev.evaluate_calls("c"), 5, "every sibling call settled");
        assert_eq!(ev.summarize_calls("c"), 0);
    }

    #[tokio::test]
    async fn summary_failure_keeps_scores() {
        let ev = Arc::new(
            ScriptedEvaluator::new()
                .with_scores("c", [40, 40, 40, 40, 40])
                .fail_summary("c", EvaluatorError::EvaluationFailed("empty".into())),
        );
        let result = pass(ev, "c").await.unwrap();
        assert_eq!(result.summary(), SUMMARY_FALLBACK);
        assert_eq!(result.total(), 200);
    }

    #[tokio::test]
    async fn summary_quota_also_falls_back() {
        let ev = Arc::new(ScriptedEvaluator::new().fail_summary(
            "c",
            EvaluatorError::QuotaExceeded {
                retry_after: Some(Duration::from_secs(5)),
            },
        ));
        let result = pass(ev, "c").await.unwrap();
        assert_eq!(result.summary(), SUMMARY_FALLBACK);
    }
}
