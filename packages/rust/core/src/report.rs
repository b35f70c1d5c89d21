//! The user-facing result of a run.

use std::time::Duration;

use hireflow_shared::{EnrichmentSource, RunId};
use serde::Serialize;

use crate::graph::StageName;
use crate::router::Route;
use crate::state::{Outputs, PipelineState, RunError, RunStatus};

/// Per-stage tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub raw_items: usize,
    pub candidates: usize,
    pub enriched_primary: usize,
    pub enriched_fallback: usize,
    pub unenriched: usize,
    pub scored: usize,
    pub shortlisted: usize,
    pub rejected: usize,
    pub scheduled: usize,
}

impl StageCounts {
    pub fn from_state(state: &PipelineState) -> Self {
        let with_source =
            |source| state.candidates.iter().filter(|c| c.enrichment.source == source).count();
        Self {
            raw_items: state.raw_items.len(),
            candidates: state.candidates.len(),
            enriched_primary: with_source(EnrichmentSource::Primary),
            enriched_fallback: with_source(EnrichmentSource::Fallback),
            unenriched: with_source(EnrichmentSource::None),
            scored: state.candidates.iter().filter(|c| c.score.is_some()).count(),
            shortlisted: state.shortlisted.len(),
            rejected: state.rejected.len(),
            scheduled: state.scheduled.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinalReport {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Unset when the run failed before scoring.
    pub route: Option<Route>,
    pub executed_stages: Vec<StageName>,
    pub counts: StageCounts,
    pub outputs: Outputs,
    /// Every recorded error, in the order stages produced them.
    pub errors: Vec<RunError>,
    pub elapsed: Duration,
    /// The final state, for callers that need candidate detail.
    pub state: PipelineState,
}

impl FinalReport {
    pub fn new(state: PipelineState, executed_stages: Vec<StageName>, elapsed: Duration) -> Self {
        Self {
            run_id: state.run_id,
            status: state.status,
            route: state.route,
            counts: StageCounts::from_state(&state),
            outputs: state.outputs.clone(),
            errors: state.errors.clone(),
            executed_stages,
            elapsed,
            state,
        }
    }

    /// `0` for a complete run (even with nobody shortlisted), `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Complete => 0,
            RunStatus::Running | RunStatus::Failed => 1,
        }
    }
}
