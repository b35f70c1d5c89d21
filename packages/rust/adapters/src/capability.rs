//! Capability traits consumed by the pipeline engine.
//!
//! The engine only ever talks to these traits. Every method returns a
//! [`hireflow_shared::Result`] so callers can classify failures with
//! [`HireflowError::is_retryable`](hireflow_shared::HireflowError::is_retryable)
//! and [`HireflowError::is_fatal`](hireflow_shared::HireflowError::is_fatal).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hireflow_shared::{
    Candidate, EnrichmentFields, InterviewSlot, ParsedResume, RawItem, Result, RowSet,
    ScheduledEvent, ScoreCriteria, ScoreOutcome,
};

/// Delivers raw resume payloads.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch at most `max_items` items, in source order.
    async fn fetch(&self, max_items: usize) -> Result<Vec<RawItem>>;

    /// Human-readable name for tracing and error records.
    fn name(&self) -> &str;
}

/// Turns one raw item into candidate fields.
#[async_trait]
pub trait ResumeParser: Send + Sync {
    async fn parse(&self, item: &RawItem) -> Result<ParsedResume>;

    fn name(&self) -> &str;
}

/// Primary enrichment against an external profile service.
#[async_trait]
pub trait ProfileEnricher: Send + Sync {
    /// Whether the primary path applies to this candidate at all.
    fn precondition(&self, candidate: &Candidate) -> bool;

    /// Fetch profile fields. `Unavailable` means "take the fallback".
    async fn enrich_primary(&self, candidate: &Candidate) -> Result<EnrichmentFields>;

    fn name(&self) -> &str;
}

/// Best-effort enrichment from data the candidate already carries.
#[async_trait]
pub trait FallbackEnricher: Send + Sync {
    async fn enrich_fallback(&self, candidate: &Candidate) -> Result<EnrichmentFields>;

    fn name(&self) -> &str;
}

/// Scores a candidate against criteria on a 0–10 scale.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, candidate: &Candidate, criteria: &ScoreCriteria) -> Result<ScoreOutcome>;

    fn name(&self) -> &str;
}

/// Creates calendar events for interview slots.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn create_event(
        &self,
        candidate: &Candidate,
        slot: &InterviewSlot,
    ) -> Result<ScheduledEvent>;

    fn name(&self) -> &str;
}

/// Publishes a row-set as a shareable sheet. Returns its URL.
#[async_trait]
pub trait TableExporter: Send + Sync {
    async fn create_sheet(&self, title: &str, rows: &RowSet) -> Result<String>;

    fn name(&self) -> &str;
}

/// Writes a row-set as a CSV file. Returns the written path.
#[async_trait]
pub trait FlatFileExporter: Send + Sync {
    async fn write_csv(&self, path: &Path, rows: &RowSet) -> Result<PathBuf>;

    fn name(&self) -> &str;
}
