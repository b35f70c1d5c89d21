//! `score` stage and threshold classification.

use hireflow_shared::{Candidate, CandidateId, ScoreOutcome};
use tracing::{debug, info, instrument, warn};

use crate::fanout::fan_out;
use crate::graph::StageName;
use crate::pipeline::{StageContext, StageResult};
use crate::retry::call_with_policy;
use crate::state::{ErrorKind, PipelineState, RunError};

/// Bring a scorer's answer into `[0, 10]`. Non-finite scores are rejected.
pub fn normalize_score(outcome: ScoreOutcome) -> Result<ScoreOutcome, String> {
    if !outcome.score.is_finite() {
        return Err(format!("scorer returned a non-finite score ({})", outcome.score));
    }
    let clamped = outcome.score.clamp(0.0, 10.0);
    if clamped != outcome.score {
        warn!(raw = outcome.score, clamped, "score outside [0, 10], clamping");
    }
    Ok(ScoreOutcome {
        score: clamped,
        rationale: outcome.rationale,
    })
}

/// Partition scored candidates. `score >= threshold` is shortlisted.
/// Unscored candidates land in neither list; order follows `candidates`.
pub fn classify(candidates: &[Candidate], threshold: f64) -> (Vec<CandidateId>, Vec<CandidateId>) {
    let mut shortlisted = Vec::new();
    let mut rejected = Vec::new();
    for candidate in candidates {
        match candidate.score {
            Some(score) if score >= threshold => shortlisted.push(candidate.id),
            Some(_) => rejected.push(candidate.id),
            None => {}
        }
    }
    (shortlisted, rejected)
}

#[instrument(skip_all, fields(stage = "score", candidates = state.candidates.len()))]
pub(crate) async fn score(mut state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    let scorer = ctx.caps.scorer.clone();
    let criteria = ctx.options.criteria.clone();
    let policy = ctx.options.call_policy;
    let total = state.candidates.len();

    let results = fan_out(state.candidates.clone(), ctx.options.concurrency, |candidate| {
        let scorer = scorer.clone();
        let criteria = criteria.clone();
        async move {
            call_with_policy(&policy, scorer.name(), || scorer.score(&candidate, &criteria)).await
        }
    })
    .await;

    let mut errors = Vec::new();
    for (index, (candidate, result)) in state.candidates.iter_mut().zip(results).enumerate() {
        ctx.progress.candidate_done(StageName::Score, index + 1, total);
        let outcome = match result {
            Ok(Ok(outcome)) => normalize_score(outcome),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(panic),
        };
        match outcome {
            Ok(outcome) => {
                debug!(candidate_id = %candidate.id, score = outcome.score, "scored");
                candidate.score = Some(outcome.score);
                candidate.rationale = Some(outcome.rationale);
            }
            Err(message) => {
                warn!(candidate_id = %candidate.id, error = %message, "scoring failed");
                candidate.score = None;
                candidate.rationale = None;
                errors.push(RunError::for_candidate(
                    StageName::Score,
                    candidate.id,
                    ErrorKind::Score,
                    message,
                ));
            }
        }
    }
    state.errors.extend(errors);

    let (shortlisted, rejected) = classify(&state.candidates, state.config.score_threshold());
    info!(
        shortlisted = shortlisted.len(),
        rejected = rejected.len(),
        threshold = state.config.score_threshold(),
        "scoring complete"
    );
    state.shortlisted = shortlisted;
    state.rejected = rejected;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candidate_with_score;

    #[test]
    fn boundary_score_is_shortlisted() {
        let candidates = vec![
            candidate_with_score(1, Some(5.0)),
            candidate_with_score(2, Some(4.99)),
        ];
        let (shortlisted, rejected) = classify(&candidates, 5.0);
        assert_eq!(shortlisted, vec![CandidateId(1)]);
        assert_eq!(rejected, vec![CandidateId(2)]);
    }

    #[test]
    fn unscored_candidates_are_in_neither_partition() {
        let candidates = vec![
            candidate_with_score(1, Some(8.2)),
            candidate_with_score(2, None),
            candidate_with_score(3, Some(1.0)),
        ];
        let (shortlisted, rejected) = classify(&candidates, 5.0);
        assert_eq!(shortlisted, vec![CandidateId(1)]);
        assert_eq!(rejected, vec![CandidateId(3)]);
    }

    #[test]
    fn partitions_keep_extraction_order() {
        let candidates: Vec<Candidate> = [9.0, 2.0, 7.5, 3.0, 6.0]
            .iter()
            .enumerate()
            .map(|(i, s)| candidate_with_score(i as u32 + 1, Some(*s)))
            .collect();
        let (shortlisted, rejected) = classify(&candidates, 5.0);
        assert_eq!(shortlisted, vec![CandidateId(1), CandidateId(3), CandidateId(5)]);
        assert_eq!(rejected, vec![CandidateId(2), CandidateId(4)]);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let high = normalize_score(ScoreOutcome {
            score: 14.0,
            rationale: "x".into(),
        })
        .unwrap();
        assert_eq!(high.score, 10.0);
        let low = normalize_score(ScoreOutcome {
            score: -2.0,
            rationale: "x".into(),
        })
        .unwrap();
        assert_eq!(low.score, 0.0);
    }

    #[test]
    fn nan_score_is_an_error() {
        let result = normalize_score(ScoreOutcome {
            score: f64::NAN,
            rationale: "x".into(),
        });
        assert!(result.unwrap_err().contains("non-finite"));
    }
}
