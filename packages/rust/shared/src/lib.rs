//! Shared types, error model, and configuration for hireflow.
//!
//! This crate is the foundation depended on by all other hireflow crates.
//! It provides:
//! - [`HireflowError`]: the unified error type
//! - Domain types ([`Candidate`], [`RawItem`], [`ScoreCriteria`], [`RowSet`], [`RunId`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentSection, ExportSection, ParsingSection, PipelineSection, RunConfig,
    RunSection, SchedulingSection, ScoringSection, SourceSection, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from, read_secret, render_config,
    validate_api_key,
};
pub use error::{HireflowError, Result};
pub use types::{
    Candidate, CandidateId, Contact, Enrichment, EnrichmentFields, EnrichmentSource,
    InterviewSlot, ParsedResume, RawItem, RowSet, RunId, ScheduledEvent, Scheduling,
    ScoreCriteria, ScoreOutcome, content_hash, media_type_for,
};
