//! Core pipeline orchestration for hireflow.
//!
//! This crate drives candidates through the fixed stage graph
//! (ingest, parse, enrich, score, optional schedule, exports, finalize),
//! accumulating non-fatal errors and producing a [`FinalReport`].

pub mod enrichment;
pub mod export;
pub mod fanout;
pub mod graph;
mod ingest;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod router;
pub mod scheduling;
pub mod scoring;
pub mod state;

#[cfg(test)]
mod testing;

pub use enrichment::{DualStrategyEnricher, EnrichmentOutcome};
pub use graph::{Edge, StageGraph, StageName};
pub use pipeline::{
    Capabilities, Pipeline, PipelineOptions, ProgressReporter, SilentProgress, StageContext,
};
pub use report::{FinalReport, StageCounts};
pub use retry::{CallPolicy, call_with_policy};
pub use router::{Route, route};
pub use scheduling::SlotPlan;
pub use state::{ErrorKind, Outputs, PipelineState, RunError, RunStatus};
