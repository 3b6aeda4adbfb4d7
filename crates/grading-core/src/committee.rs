//! Committee coordination: two correctors, a discrepancy rule, and either
//! averaging or supervisor consensus.
//!
//! The consolidation functions are pure and deterministic; [`Committee`] adds
//! the evaluator-facing orchestration on top of them.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::corrector::run_corrector_pass;
use crate::domain::{
    Competency, ConsolidatedResult, ConsolidatedScore, CorrectorResult, CorrectorSlot, Essay,
    ResultSource, Rubric,
};
use crate::evaluator::{CorrectorProfile, Evaluator, QuotaExceeded};
use crate::metrics::METRICS;
use crate::obs;

/// Totals further apart than this trigger a supervisor pass.
pub const TOTAL_DISCREPANCY_THRESHOLD: u16 = 100;
/// Any single competency further apart than this triggers a supervisor pass.
pub const COMPETENCY_DISCREPANCY_THRESHOLD: u16 = 80;

/// Largest per-competency score difference between two correctors.
pub fn max_competency_gap(a: &CorrectorResult, b: &CorrectorResult) -> u16 {
    a.scores()
        .iter()
        .zip(b.scores())
        .map(|(x, y)| x.points().abs_diff(y.points()))
        .max()
        .unwrap_or(0)
}

/// Whether two corrector results disagree enough to need a supervisor.
pub fn has_discrepancy(a: &CorrectorResult, b: &CorrectorResult) -> bool {
    a.total().abs_diff(b.total()) > TOTAL_DISCREPANCY_THRESHOLD
        || max_competency_gap(a, b) > COMPETENCY_DISCREPANCY_THRESHOLD
}

fn mean(x: u16, y: u16) -> f64 {
    (f64::from(x) + f64::from(y)) / 2.0
}

/// Per-competency arithmetic mean of two correctors.
pub fn consolidate_average(a: &CorrectorResult, b: &CorrectorResult) -> ConsolidatedResult {
    let scores = Competency::ALL
        .iter()
        .map(|&competency| {
            let sa = a.score(competency);
            let sb = b.score(competency);
            ConsolidatedScore {
                competency,
                score: mean(sa.points(), sb.points()),
                rationale: format!(
                    "[Average C{n}] {id_a} ({pa}): {ra} | {id_b} ({pb}): {rb}",
                    n = competency.number(),
                    id_a = a.corrector_id(),
                    pa = sa.points(),
                    ra = sa.rationale,
                    id_b = b.corrector_id(),
                    pb = sb.points(),
                    rb = sb.rationale,
                ),
            }
        })
        .collect();

    ConsolidatedResult::new(scores, ResultSource::Averaged, vec![a.clone(), b.clone()])
}

/// Consensus score for one competency: the mean of the closest pair.
///
/// Pairs are compared in the order (A,C), (B,C), (A,B) and the first
/// minimal one wins ties.
pub fn closest_pair_mean(a: u16, b: u16, c: u16) -> f64 {
    let pairs = [(a, c), (b, c), (a, b)];
    let mut best = pairs[0];
    for pair in &pairs[1..] {
        if pair.0.abs_diff(pair.1) < best.0.abs_diff(best.1) {
            best = *pair;
        }
    }
    mean(best.0, best.1)
}

/// Per-competency consensus among two correctors and a supervisor.
pub fn resolve_with_supervisor(
    a: &CorrectorResult,
    b: &CorrectorResult,
    supervisor: &CorrectorResult,
) -> ConsolidatedResult {
    let scores = Competency::ALL
        .iter()
        .map(|&competency| {
            let (pa, pb, pc) = (
                a.score(competency).points(),
                b.score(competency).points(),
                supervisor.score(competency).points(),
            );
            let score = closest_pair_mean(pa, pb, pc);
            ConsolidatedScore {
                competency,
                score,
                rationale: format!(
                    "[Consensus C{n}] committee scores: ({pa}, {pb}, {pc}); final competency score: {score}",
                    n = competency.number(),
                ),
            }
        })
        .collect();

    ConsolidatedResult::new(
        scores,
        ResultSource::SupervisorConsensus,
        vec![a.clone(), b.clone(), supervisor.clone()],
    )
}

/// Outcome of [`consolidate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Consolidated(ConsolidatedResult),
    /// The correctors disagree and no supervisor result is available yet.
    NeedsSupervisor,
}

/// Apply the committee rule to whatever results are available.
pub fn consolidate(
    a: &CorrectorResult,
    b: &CorrectorResult,
    supervisor: Option<&CorrectorResult>,
) -> Verdict {
    if !has_discrepancy(a, b) {
        return Verdict::Consolidated(consolidate_average(a, b));
    }
    match supervisor {
        Some(c) => Verdict::Consolidated(resolve_with_supervisor(a, b, c)),
        None => Verdict::NeedsSupervisor,
    }
}

/// Corrector profiles for the three committee seats.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitteeProfiles {
    pub first: CorrectorProfile,
    pub second: CorrectorProfile,
    pub supervisor: CorrectorProfile,
}

impl Default for CommitteeProfiles {
    fn default() -> Self {
        Self {
            first: CorrectorProfile::strict(),
            second: CorrectorProfile::standard(),
            supervisor: CorrectorProfile::supervisor(),
        }
    }
}

/// Runs corrector passes against one evaluator.
#[derive(Clone)]
pub struct Committee {
    evaluator: Arc<dyn Evaluator>,
    rubric: Arc<Rubric>,
    profiles: CommitteeProfiles,
}

impl Committee {
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            rubric: Arc::new(Rubric::standard()),
            profiles: CommitteeProfiles::default(),
        }
    }

    pub fn with_rubric(mut self, rubric: Rubric) -> Self {
        self.rubric = Arc::new(rubric);
        self
    }

    pub fn with_profiles(mut self, profiles: CommitteeProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profile(&self, slot: CorrectorSlot) -> &CorrectorProfile {
        match slot {
            CorrectorSlot::First => &self.profiles.first,
            CorrectorSlot::Second => &self.profiles.second,
            CorrectorSlot::Supervisor => &self.profiles.supervisor,
        }
    }

    /// Run the corrector pass for one committee seat.
    pub async fn run_stage(
        &self,
        slot: CorrectorSlot,
        essay: Arc<Essay>,
    ) -> Result<CorrectorResult, QuotaExceeded> {
        if slot == CorrectorSlot::Supervisor {
            METRICS.inc_supervisor_passes();
        }
        run_corrector_pass(
            Arc::clone(&self.evaluator),
            Arc::clone(&self.rubric),
            essay,
            self.profile(slot),
        )
        .await
    }

    /// Grade `essay` in one go, without checkpoints or pauses.
    #[instrument(skip(self, essay), fields(topic = %essay.topic))]
    pub async fn grade(&self, essay: &Essay) -> Result<ConsolidatedResult, QuotaExceeded> {
        let essay = Arc::new(essay.clone());

        let (a, b) = tokio::join!(
            self.run_stage(CorrectorSlot::First, Arc::clone(&essay)),
            self.run_stage(CorrectorSlot::Second, Arc::clone(&essay)),
        );
        let (a, b) = match (a, b) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(x), Err(y)) => return Err(x.merge(y)),
            (Err(x), _) | (_, Err(x)) => return Err(x),
        };

        match consolidate(&a, &b, None) {
            Verdict::Consolidated(result) => Ok(result),
            Verdict::NeedsSupervisor => {
                obs::emit_discrepancy(a.total(), b.total(), max_competency_gap(&a, &b));
                let c = self.run_stage(CorrectorSlot::Supervisor, essay).await?;
                let result = resolve_with_supervisor(&a, &b, &c);
                info!(total = result.total, "supervisor consensus reached");
                Ok(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompetencyScore, ScoreLevel};
    use crate::evaluator::fakes::ScriptedEvaluator;

    fn result(id: &str, points: [i64; 5]) -> CorrectorResult {
        let scores = Competency::ALL
            .iter()
            .zip(points)
            .map(|(c, p)| {
                CompetencyScore::new(*c, ScoreLevel::try_from(p).unwrap(), format!("{id}-{p}"))
            })
            .collect();
        CorrectorResult::assemble(id, scores, "s").unwrap()
    }

    #[test]
    fn test_discrepancy_by_total() {
        let a = result("a", [80, 80, 80, 80, 80]);
        let b = result("b", [120, 120, 120, 120, 160]);
        assert_eq!(a.total().abs_diff(b.total()), 240);
        assert!(has_discrepancy(&a, &b));
    }

    #[test]
    fn test_discrepancy_by_single_competency() {
        let a = result("a", [40, 160, 120, 120, 120]);
        let b = result("b", [160, 120, 120, 120, 120]);
        assert_eq!(a.total().abs_diff(b.total()), 80);
        assert_eq!(max_competency_gap(&a, &b), 120);
        assert!(has_discrepancy(&a, &b));
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        // A gap of exactly 80 on one competency is still agreement.
        let a = result("a", [80, 120, 120, 120, 120]);
        let b = result("b", [160, 120, 120, 120, 120]);
        assert!(!has_discrepancy(&a, &b));
    }

    #[test]
    fn test_average_keeps_half_points_and_labels_origins() {
        let a = result("corrector-1", [160, 120, 120, 160, 160]);
        let b = result("corrector-2", [200, 160, 120, 120, 160]);
        let out = consolidate_average(&a, &b);

        assert_eq!(out.source, ResultSource::Averaged);
        assert_eq!(out.scores[0].score, 180.0);
        assert_eq!(out.total, 740.0);
        assert_eq!(
            out.scores[0].rationale,
            "[Average C1] corrector-1 (160): corrector-1-160 | corrector-2 (200): corrector-2-200"
        );
        assert_eq!(out.inputs.len(), 2);
    }

    #[test]
    fn test_consensus_tie_break_prefers_b_c_over_a_b() {
        // |80-160| = 80, |120-160| = 40, |80-120| = 40
        assert_eq!(closest_pair_mean(80, 120, 160), 140.0);
    }

    #[test]
    fn test_consensus_tie_break_prefers_a_c_first() {
        // |80-120| = 40, |160-120| = 40
        assert_eq!(closest_pair_mean(80, 160, 120), 100.0);
        // all equal distances collapse to (A,C)
        assert_eq!(closest_pair_mean(40, 40, 40), 40.0);
    }

    #[test]
    fn test_consensus_picks_closest_pair() {
        assert_eq!(closest_pair_mean(0, 200, 160), 180.0);
        assert_eq!(closest_pair_mean(200, 0, 160), 180.0);
        assert_eq!(closest_pair_mean(120, 120, 0), 120.0);
    }

    #[test]
    fn test_resolve_with_supervisor_formats_rationale() {
        let a = result("a", [80, 80, 80, 80, 80]);
        let b = result("b", [120, 200, 200, 200, 200]);
        let c = result("s", [160, 200, 200, 200, 200]);
        let out = resolve_with_supervisor(&a, &b, &c);

        assert_eq!(out.source, ResultSource::SupervisorConsensus);
        assert_eq!(
            out.scores[0].rationale,
            "[Consensus C1] committee scores: (80, 120, 160); final competency score: 140"
        );
        assert_eq!(out.total, 140.0 + 4.0 * 200.0);
        assert_eq!(out.inputs.len(), 3);
    }

    #[test]
    fn test_consolidate_requests_supervisor_only_on_discrepancy() {
        let a = result("a", [80, 80, 80, 80, 80]);
        let b = result("b", [200, 200, 200, 200, 200]);
        assert_eq!(consolidate(&a, &b, None), Verdict::NeedsSupervisor);

        let close = result("b", [120, 80, 80, 80, 80]);
        assert!(matches!(
            consolidate(&a, &close, Some(&b)),
            Verdict::Consolidated(ConsolidatedResult {
                source: ResultSource::Averaged,
                ..
            })
        ));
    }

    #[test]
    fn test_merge_symmetric_numeric_result() {
        let a = result("a", [200, 160, 120, 80, 120]);
        let b = result("b", [160, 160, 80, 120, 80]);
        let ab = consolidate_average(&a, &b);
        let ba = consolidate_average(&b, &a);

        assert_eq!(ab.total, ba.total);
        for (x, y) in ab.scores.iter().zip(&ba.scores) {
            assert_eq!(x.score, y.score);
        }
    }

    #[tokio::test]
    async fn grade_without_discrepancy_skips_supervisor() {
        let ev = Arc::new(
            ScriptedEvaluator::new()
                .with_scores("corrector-1", [160, 120, 120, 160, 160])
                .with_scores("corrector-2", [200, 160, 120, 120, 160]),
        );
        let committee = Committee::new(ev.clone());
        let out = committee.grade(&Essay::new("t", "x")).await.unwrap();

        assert_eq!(out.source, ResultSource::Averaged);
        assert_eq!(out.total, 740.0);
        assert_eq!(ev.evaluate_calls("supervisor"), 0);
    }

    #[tokio::test]
    async fn grade_with_discrepancy_runs_supervisor() {
        let ev = Arc::new(
            ScriptedEvaluator::new()
                .with_scores("corrector-1", [80, 80, 80, 80, 80])
                .with_scores("corrector-2", [120, 120, 120, 120, 120])
                .with_scores("supervisor", [160, 160, 160, 160, 160]),
        );
        let committee = Committee::new(ev.clone());
        let out = committee.grade(&Essay::new("t", "x")).await.unwrap();

        assert_eq!(out.source, ResultSource::SupervisorConsensus);
        assert_eq!(out.total, 700.0);
        assert_eq!(ev.evaluate_calls("supervisor"), 5);
    }
}
