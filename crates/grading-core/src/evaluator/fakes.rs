//! Deterministic in-memory evaluator for tests.
//!
//! Behaviour is scripted per corrector id. Unscripted correctors score 120 on
//! every competency.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Competency, CompetencyScore, ScoreLevel};
use crate::evaluator::{CorrectorProfile, EvaluationRequest, Evaluator, EvaluatorError};

#[derive(Debug, Clone)]
struct Script {
    /// Raw points per competency; values off the rubric become evaluation failures.
    points: [i64; 5],
    failures: HashMap<Competency, String>,
    quota_failures_left: u32,
    quota_wait: Option<Duration>,
    summary_error: Option<EvaluatorError>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            points: [120; 5],
            failures: HashMap::new(),
            quota_failures_left: 0,
            quota_wait: None,
            summary_error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub evaluate: usize,
    pub summarize: usize,
}

/// Scripted [`Evaluator`] with call accounting.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<HashMap<String, CallCounts>>,
    latency: Option<Duration>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, corrector_id: &str, edit: impl FnOnce(&mut Script)) {
        let mut scripts = self.scripts.lock().unwrap();
        edit(scripts.entry(corrector_id.to_string()).or_default());
    }

    /// Points returned for competencies 1..=5.
    pub fn with_scores(self, corrector_id: &str, points: [i64; 5]) -> Self {
        self.script(corrector_id, |s| s.points = points);
        self
    }

    /// Make one competency fail with `EvaluationFailed(reason)`.
    pub fn fail_competency(self, corrector_id: &str, competency: u8, reason: &str) -> Self {
        if let Ok(c) = Competency::try_from(competency) {
            self.script(corrector_id, |s| {
                s.failures.insert(c, reason.to_string());
            });
        }
        self
    }

    /// The next `times` evaluate calls for this corrector hit quota.
    pub fn quota_failures(self, corrector_id: &str, times: u32, wait: Option<Duration>) -> Self {
        self.script(corrector_id, |s| {
            s.quota_failures_left = times;
            s.quota_wait = wait;
        });
        self
    }

    pub fn fail_summary(self, corrector_id: &str, error: EvaluatorError) -> Self {
        self.script(corrector_id, |s| s.summary_error = Some(error));
        self
    }

    /// Delay every call by `latency` (use with a paused tokio clock).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self, corrector_id: &str) -> CallCounts {
        self.calls
            .lock()
            .unwrap()
            .get(corrector_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn evaluate_calls(&self, corrector_id: &str) -> usize {
        self.calls(corrector_id).evaluate
    }

    pub fn summarize_calls(&self, corrector_id: &str) -> usize {
        self.calls(corrector_id).summarize
    }

    fn count(&self, corrector_id: &str, edit: impl FnOnce(&mut CallCounts)) {
        let mut calls = self.calls.lock().unwrap();
        edit(calls.entry(corrector_id.to_string()).or_default());
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<CompetencyScore, EvaluatorError> {
        let id = request.profile.id.as_str();
        let competency = request.dimension.competency;
        self.count(id, |c| c.evaluate += 1);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(id.to_string()).or_default();
            if script.quota_failures_left > 0 {
                script.quota_failures_left -= 1;
                Err(EvaluatorError::QuotaExceeded {
                    retry_after: script.quota_wait,
                })
            } else if let Some(reason) = script.failures.get(&competency) {
                Err(EvaluatorError::EvaluationFailed(reason.clone()))
            } else {
                Ok(script.points[competency.index()])
            }
        };

        let points = outcome?;
        let level = ScoreLevel::try_from(points)
            .map_err(|e| EvaluatorError::EvaluationFailed(e.to_string()))?;
        Ok(CompetencyScore::new(
            competency,
            level,
            format!("{id} scored {competency} at {points}"),
        ))
    }

    async fn summarize(
        &self,
        profile: &CorrectorProfile,
        scores: &[CompetencyScore],
    ) -> Result<String, EvaluatorError> {
        self.count(&profile.id, |c| c.summarize += 1);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get(&profile.id)
            .and_then(|s| s.summary_error.clone());
        if let Some(err) = scripted {
            return Err(err);
        }

        let total: u16 = scores.iter().map(CompetencyScore::points).sum();
        Ok(format!("{} summary: total {total}", profile.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Rubric;

    #[tokio::test]
    async fn quota_failures_are_consumed_in_order() {
        let ev = ScriptedEvaluator::new()
            .with_scores("a", [200, 160, 120, 80, 40])
            .quota_failures("a", 1, Some(Duration::from_secs(20)));
        let rubric = Rubric::standard();
        let profile = CorrectorProfile::new("a", 0.1);
        let request = EvaluationRequest {
            profile: &profile,
            dimension: &rubric.dimensions()[0],
            text: "t",
            topic: "p",
        };

        let first = ev.evaluate(&request).await.unwrap_err();
        assert_eq!(
            first,
            EvaluatorError::QuotaExceeded {
                retry_after: Some(Duration::from_secs(20))
            }
        );
        let second = ev.evaluate(&request).await.unwrap();
        assert_eq!(second.points(), 200);
        assert_eq!(ev.evaluate_calls("a"), 2);
        assert_eq!(ev.evaluate_calls("b"), 0);
    }

    #[tokio::test]
    async fn off_rubric_points_fail_evaluation() {
        let ev = ScriptedEvaluator::new().with_scores("a", [150, 0, 0, 0, 0]);
        let rubric = Rubric::standard();
        let profile = CorrectorProfile::new("a", 0.1);
        let request = EvaluationRequest {
            profile: &profile,
            dimension: &rubric.dimensions()[0],
            text: "t",
            topic: "p",
        };
        assert!(matches!(
            ev.evaluate(&request).await,
            Err(EvaluatorError::EvaluationFailed(_))
        ));
    }
}
