//! Execution engine: walks the stage graph over one `PipelineState`.
//!
//! Stages are barriers. Each receives the previous snapshot and returns the
//! next one, or a [`Fatal`] that stops the run with status `failed`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hireflow_adapters::{
    FallbackEnricher, FlatFileExporter, ProfileEnricher, ResumeParser, Scheduler, Scorer, Source,
    TableExporter,
};
use hireflow_shared::{AppConfig, Result, RunConfig, ScoreCriteria, expand_home};
use tracing::{error, info, instrument};

use crate::graph::{StageGraph, StageName};
use crate::report::FinalReport;
use crate::retry::CallPolicy;
use crate::scheduling::SlotPlan;
use crate::state::{PipelineState, RunError, RunStatus};
use crate::{enrichment, export, ingest, scheduling, scoring};

/// Capability implementations injected into the engine.
#[derive(Clone)]
pub struct Capabilities {
    /// Remote source, consulted only when the run enables it.
    pub source: Option<Arc<dyn Source>>,
    /// Local inbox, always read.
    pub inbox: Arc<dyn Source>,
    pub parser: Arc<dyn ResumeParser>,
    pub primary_enricher: Option<Arc<dyn ProfileEnricher>>,
    pub fallback_enricher: Arc<dyn FallbackEnricher>,
    pub scorer: Arc<dyn Scorer>,
    pub scheduler: Arc<dyn Scheduler>,
    pub table_exporter: Arc<dyn TableExporter>,
    pub flat_file_exporter: Arc<dyn FlatFileExporter>,
}

/// Engine settings that are not part of the per-run [`RunConfig`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Max concurrent per-candidate tasks within a stage.
    pub concurrency: usize,
    pub call_policy: CallPolicy,
    pub criteria: ScoreCriteria,
    /// Where the CSV and JSON artifacts go.
    pub output_dir: PathBuf,
    pub slot_plan: SlotPlan,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_policy: CallPolicy::default(),
            criteria: ScoreCriteria::default(),
            output_dir: PathBuf::from("hireflow-output"),
            slot_plan: SlotPlan::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            concurrency: config.pipeline.concurrency.max(1) as usize,
            call_policy: CallPolicy::from(&config.pipeline),
            criteria: config.criteria.clone(),
            output_dir: expand_home(&config.pipeline.output_dir),
            slot_plan: SlotPlan::try_from(&config.scheduling)?,
        })
    }
}

/// What a stage sees besides the state.
pub struct StageContext<'a> {
    pub caps: &'a Capabilities,
    pub options: &'a PipelineOptions,
    pub progress: &'a dyn ProgressReporter,
}

/// A stage aborted the run. Carries the state as it was.
#[derive(Debug)]
pub struct Fatal {
    pub state: PipelineState,
    pub error: RunError,
}

pub type StageResult = std::result::Result<PipelineState, Box<Fatal>>;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn stage_started(&self, stage: StageName);
    /// Called as each per-candidate result is merged.
    fn candidate_done(&self, stage: StageName, current: usize, total: usize);
    /// Called once with the final report.
    fn done(&self, report: &FinalReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: StageName) {}
    fn candidate_done(&self, _stage: StageName, _current: usize, _total: usize) {}
    fn done(&self, _report: &FinalReport) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Pipeline {
    caps: Capabilities,
    options: PipelineOptions,
    graph: StageGraph,
}

impl Pipeline {
    pub fn new(caps: Capabilities, options: PipelineOptions) -> Self {
        Self {
            caps,
            options,
            graph: StageGraph::standard(),
        }
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Execute one run to completion (or to its first fatal error).
    #[instrument(skip_all, fields(
        source_enabled = config.source_enabled(),
        max_items = config.max_items(),
        threshold = config.score_threshold(),
    ))]
    pub async fn run(&self, config: RunConfig, progress: &dyn ProgressReporter) -> FinalReport {
        let start = Instant::now();
        let mut state = PipelineState::new(config);
        let ctx = StageContext {
            caps: &self.caps,
            options: &self.options,
            progress,
        };
        info!(run_id = %state.run_id, "starting pipeline run");

        let mut executed = Vec::new();
        let mut current = Some(self.graph.entry());
        while let Some(stage) = current {
            progress.stage_started(stage);
            executed.push(stage);
            state = match run_stage(stage, state, &ctx).await {
                Ok(next) => next,
                Err(fatal) => {
                    let Fatal { mut state, error } = *fatal;
                    error!(%stage, error = %error, "fatal error, aborting run");
                    state.record(error);
                    state.status = RunStatus::Failed;
                    let report = FinalReport::new(state, executed, start.elapsed());
                    progress.done(&report);
                    return report;
                }
            };

            let (next, route) = self.graph.next(stage, &state);
            if let Some(route) = route {
                info!(%route, shortlisted = state.shortlisted.len(), "route selected");
                state.route = Some(route);
            }
            current = next;
        }

        state.status = RunStatus::Complete;
        let report = FinalReport::new(state, executed, start.elapsed());
        info!(
            run_id = %report.run_id,
            shortlisted = report.counts.shortlisted,
            scheduled = report.counts.scheduled,
            errors = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "pipeline run complete"
        );
        progress.done(&report);
        report
    }
}

async fn run_stage(stage: StageName, state: PipelineState, ctx: &StageContext<'_>) -> StageResult {
    match stage {
        StageName::Ingest => ingest::ingest(state, ctx).await,
        StageName::Parse => ingest::parse(state, ctx).await,
        StageName::Enrich => enrichment::enrich(state, ctx).await,
        StageName::Score => scoring::score(state, ctx).await,
        StageName::Schedule => scheduling::schedule(state, ctx).await,
        StageName::ExportAll => export::export_all(state, ctx).await,
        StageName::ExportShortlist => export::export_shortlist(state, ctx).await,
        StageName::Finalize => export::finalize(state, ctx).await,
    }
}
